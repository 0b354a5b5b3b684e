//! Configuration loading
//!
//! Handles loading configuration from embedded defaults, project files and
//! environment variables, in increasing priority.

use config::{Config, Environment, File, FileFormat, Map};
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use vbg_core::{Error, Result, VbgConfig};

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

/// Project-level override files, lowest priority first
pub const PROJECT_CONFIG_FILES: &[&str] = &["vbg_config.json", "vbg.json", "vbg.toml"];

/// Environment variable prefix
pub const ENV_PREFIX: &str = "VBG";

/// Load configuration for the project at `root` and validate it
pub fn load_config(root: &Path) -> Result<VbgConfig> {
    load_with_env(root, None)
}

/// Load with an explicit environment map instead of the process environment
pub(crate) fn load_with_env(root: &Path, env: Option<Map<String, String>>) -> Result<VbgConfig> {
    let mut builder = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

    // 2. Project overrides (optional)
    for name in PROJECT_CONFIG_FILES {
        let path = root.join(name);
        if path.is_file() {
            debug!(path = %path.display(), "Loading config file");
        }
        builder = builder.add_source(File::from(path).required(false));
    }

    // 3. Environment variables (highest priority)
    // prefix_separator("_") makes VBG_EXECUTION__MODE work with a single
    // underscore after the prefix.
    let config = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        )
        .build()
        .map_err(|e| Error::config("config", e.to_string()))?;

    let config: VbgConfig = config
        .try_deserialize()
        .map_err(|e| Error::config("config", e.to_string()))?;
    config.validate()?;

    info!(
        primary = %config.roles.primary,
        auditor = config.auditor_id().unwrap_or("-"),
        mode = %config.execution.mode,
        "Configuration loaded"
    );
    Ok(config)
}

/// Write `config` as TOML to `path`
pub fn save_config(config: &VbgConfig, path: &Path) -> anyhow::Result<()> {
    use anyhow::Context;

    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }
    fs::write(path, content).context("Failed to write config file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vbg_core::ExecutionMode;

    fn env(pairs: &[(&str, &str)]) -> Option<Map<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_embedded_defaults_match_code_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_with_env(dir.path(), env(&[])).unwrap();
        assert_eq!(config, VbgConfig::default());
    }

    #[test]
    fn test_project_toml_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("vbg.toml"),
            "[execution]\nmode = \"sequential\"\ntimeout_secs = 60\n\n[agents.codex]\ncommand = \"codex\"\nargs = [\"exec\", \"{prompt}\"]\n\n[roles]\nauditor = \"codex\"\n",
        )
        .unwrap();

        let config = load_with_env(dir.path(), env(&[])).unwrap();
        assert_eq!(config.execution.mode, ExecutionMode::Sequential);
        assert_eq!(config.execution.timeout_secs, 60);
        assert_eq!(config.auditor_id(), Some("codex"));
        assert!(config.agents.contains_key("claude"));
        assert_eq!(config.session.max_entries, 20);
    }

    #[test]
    fn test_json_file_is_layered() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("vbg.json"),
            r#"{"session": {"max_entries": 5}}"#,
        )
        .unwrap();

        let config = load_with_env(dir.path(), env(&[])).unwrap();
        assert_eq!(config.session.max_entries, 5);
    }

    #[test]
    fn test_env_overrides_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("vbg.toml"), "[execution]\ntimeout_secs = 60\n").unwrap();

        let config = load_with_env(
            dir.path(),
            env(&[("VBG_EXECUTION__TIMEOUT_SECS", "90"), ("VBG_EXECUTION__MODE", "sequential")]),
        )
        .unwrap();
        assert_eq!(config.execution.timeout_secs, 90);
        assert_eq!(config.execution.mode, ExecutionMode::Sequential);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("vbg.toml"), "[session]\nmax_context_tokens = 0\n").unwrap();

        let err = load_with_env(dir.path(), env(&[])).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { ref field, .. } if field == "session.max_context_tokens"));
    }

    #[test]
    fn test_unknown_role_agent_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_with_env(dir.path(), env(&[("VBG_ROLES__PRIMARY", "nobody")])).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { ref field, .. } if field == "roles.primary"));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("vbg.toml"), "[execution\nmode = ").unwrap();

        let err = load_with_env(dir.path(), env(&[])).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn test_saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = VbgConfig::default();
        config.execution.mode = ExecutionMode::Sequential;
        save_config(&config, &dir.path().join("vbg.toml")).unwrap();

        let loaded = load_with_env(dir.path(), env(&[])).unwrap();
        assert_eq!(loaded, config);
    }
}
