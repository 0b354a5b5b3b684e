//! Project type detection
//!
//! Classifies the working directory from its marker files and derives what
//! the rest of the engine needs from that tag: the source extensions that
//! rank highest during file selection, the directories to skip while
//! scanning, and the command used for a build baseline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Component, Path};
use tracing::debug;

/// Directories never scanned regardless of project type
pub const DEFAULT_IGNORED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
    "target",
    "build",
    ".next",
    "dist",
];

/// Extensions considered by UI review
pub const UI_EXTENSIONS: &[&str] = &["tsx", "jsx", "css", "scss"];

/// Detected project kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectType {
    /// `package.json` depending on `next`
    #[serde(rename = "nextjs")]
    NextJs,
    /// `package.json` depending on `react`
    React,
    /// `pom.xml`
    SpringBootMaven,
    /// `build.gradle` or `build.gradle.kts`
    SpringBootGradle,
    /// `pyproject.toml`, `requirements.txt` or `setup.py`
    Python,
    /// `Cargo.toml`
    Rust,
    /// Nothing recognised
    Unknown,
}

impl ProjectType {
    /// Inspect marker files in `root`
    #[must_use]
    pub fn detect(root: &Path) -> Self {
        if let Some(kind) = detect_from_package_json(&root.join("package.json")) {
            return kind;
        }
        if root.join("pom.xml").is_file() {
            return Self::SpringBootMaven;
        }
        if root.join("build.gradle").is_file() || root.join("build.gradle.kts").is_file() {
            return Self::SpringBootGradle;
        }
        if ["requirements.txt", "pyproject.toml", "setup.py"]
            .iter()
            .any(|marker| root.join(marker).is_file())
        {
            return Self::Python;
        }
        if root.join("Cargo.toml").is_file() {
            return Self::Rust;
        }
        Self::Unknown
    }

    /// Stable tag used in reports and prompts
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NextJs => "nextjs",
            Self::React => "react",
            Self::SpringBootMaven => "spring-boot-maven",
            Self::SpringBootGradle => "spring-boot-gradle",
            Self::Python => "python",
            Self::Rust => "rust",
            Self::Unknown => "unknown",
        }
    }

    /// Whether UI review applies
    #[must_use]
    pub fn is_ui(&self) -> bool {
        matches!(self, Self::NextJs | Self::React)
    }

    /// Extensions (without dot) that count as project source
    #[must_use]
    pub fn source_extensions(&self) -> &'static [&'static str] {
        match self {
            Self::NextJs | Self::React => &["ts", "tsx", "js", "jsx", "css", "scss"],
            Self::SpringBootMaven => &["java", "xml", "properties", "yml"],
            Self::SpringBootGradle => &["java", "kt", "gradle", "kts", "properties", "yml"],
            Self::Python => &["py"],
            Self::Rust => &["rs"],
            Self::Unknown => &["py", "js", "ts", "java", "rs", "go"],
        }
    }

    /// Build command for the refactor baseline
    #[must_use]
    pub fn build_command(&self) -> Option<(&'static str, Vec<String>)> {
        let (program, args): (&str, &[&str]) = match self {
            Self::NextJs | Self::React => ("npm", &["run", "build"]),
            Self::SpringBootMaven => ("mvn", &["compile", "-q"]),
            Self::SpringBootGradle => ("gradle", &["compileJava", "-q"]),
            Self::Python => ("python", &["-m", "compileall", "-q", "."]),
            Self::Rust => ("cargo", &["build", "--quiet"]),
            Self::Unknown => return None,
        };
        Some((program, args.iter().map(|a| a.to_string()).collect()))
    }

    /// Ignore rules for scanning this project
    #[must_use]
    pub fn ignore_rules(&self) -> IgnoreRules {
        IgnoreRules::default()
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn detect_from_package_json(path: &Path) -> Option<ProjectType> {
    let content = fs::read_to_string(path).ok()?;
    let manifest: serde_json::Value = match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Unreadable package.json");
            return None;
        }
    };

    let depends_on = |name: &str| {
        ["dependencies", "devDependencies"]
            .iter()
            .any(|section| manifest.get(section).and_then(|deps| deps.get(name)).is_some())
    };

    if depends_on("next") {
        Some(ProjectType::NextJs)
    } else if depends_on("react") {
        Some(ProjectType::React)
    } else {
        None
    }
}

/// Path exclusion rules applied while scanning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreRules {
    dirs: BTreeSet<String>,
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self {
            dirs: DEFAULT_IGNORED_DIRS.iter().map(|d| d.to_string()).collect(),
        }
    }
}

impl IgnoreRules {
    /// Additionally ignore a directory name
    #[must_use]
    pub fn with_dir(mut self, name: impl Into<String>) -> Self {
        self.dirs.insert(name.into());
        self
    }

    /// Whether a directory with this name is pruned
    #[must_use]
    pub fn is_ignored_dir(&self, name: &str) -> bool {
        self.dirs.contains(name)
    }

    /// Whether any component of the relative `path` is ignored
    #[must_use]
    pub fn is_ignored(&self, path: &Path) -> bool {
        path.components().any(|component| match component {
            Component::Normal(name) => name.to_str().is_some_and(|n| self.is_ignored_dir(n)),
            _ => false,
        })
    }
}
