//! Error types for vbg-core
//!
//! This module provides error types and user-friendly error formatting.
//! Agent-level failures (missing binary, timeout, non-zero exit) are not
//! errors here: they are carried as `CompletionKind` inside the report.

use thiserror::Error;
use uuid::Uuid;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration
    #[error("invalid configuration: {field}: {message}")]
    InvalidConfig {
        /// Config field name
        field: String,
        /// Detailed message
        message: String,
    },

    /// Task text longer than the configured limit
    #[error("input too long: {len} characters (max {max})")]
    InputTooLong {
        /// Actual length in characters
        len: usize,
        /// Configured maximum
        max: usize,
    },

    /// Project name longer than the configured limit
    #[error("project name too long: {len} characters (max {max})")]
    ProjectNameTooLong {
        /// Actual length in characters
        len: usize,
        /// Configured maximum
        max: usize,
    },

    /// Malformed task request
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Mode not applicable to the detected project
    #[error("mode '{mode}' is not supported for {project_type} projects")]
    UnsupportedMode {
        /// Requested mode
        mode: String,
        /// Detected project type
        project_type: String,
    },

    /// Explicit session id that does not exist
    #[error("session not found: {0}")]
    SessionNotFound(Uuid),

    /// Session file that could not be parsed
    #[error("session file corrupt: {path}: {message}")]
    SessionCorrupt {
        /// File path
        path: String,
        /// Parse error
        message: String,
    },

    /// Filesystem error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Tool error (benchmark, process spawning)
    #[error("tool error: {0}")]
    Tool(#[from] vbg_tools::Error),
}

impl Error {
    /// Shorthand for a configuration error
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trait for user-friendly error messages
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get a suggestion for how to fix the error
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for Error {
    fn user_message(&self) -> String {
        match self {
            Error::InvalidConfig { field, message } => {
                format!("⚙️ Configuration error in '{}': {}", field, message)
            }
            Error::InputTooLong { len, max } => {
                format!("✂️ Input is too long ({} characters, limit {}).", len, max)
            }
            Error::ProjectNameTooLong { len, max } => {
                format!(
                    "✂️ Project name is too long ({} characters, limit {}).",
                    len, max
                )
            }
            Error::InvalidInput(msg) => format!("❓ {}", msg),
            Error::UnsupportedMode { mode, project_type } => format!(
                "🚫 The {} mode is not available for {} projects.",
                mode, project_type
            ),
            Error::SessionNotFound(id) => format!("🗂️ Session {} does not exist.", id),
            Error::SessionCorrupt { path, .. } => {
                format!("🗂️ Session file {} could not be read.", path)
            }
            Error::Io(e) => format!("💾 File system error: {}", e),
            Error::Serialization(e) => format!("💾 Serialization error: {}", e),
            Error::Tool(e) => format!("🔧 Tool error: {}", e),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            Error::InvalidConfig { field, .. } => Some(format!(
                "💡 Check the '{}' setting in vbg.toml or the VBG_ environment variables.",
                field
            )),
            Error::InputTooLong { .. } => {
                Some("💡 Shorten the request or raise limits.max_input_chars.".to_string())
            }
            Error::ProjectNameTooLong { .. } => Some(
                "💡 Use a shorter --name or raise limits.max_project_name_chars.".to_string(),
            ),
            Error::UnsupportedMode { .. } => Some(
                "💡 UI review needs a React or Next.js project. Try --recommend instead."
                    .to_string(),
            ),
            Error::SessionNotFound(_) => Some(
                "💡 Run `vbg --sessions` to list sessions, or `vbg --new-session`.".to_string(),
            ),
            _ => None,
        }
    }
}

/// Format an error for display in the CLI
pub fn format_error_for_cli(error: &Error) -> String {
    let mut output = error.user_message();
    output.push('\n');

    if let Some(suggestion) = error.suggestion() {
        output.push('\n');
        output.push_str(&suggestion);
        output.push('\n');
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_message() {
        let error = Error::config("roles.primary", "unknown agent 'foo'");

        let msg = error.user_message();
        assert!(msg.contains("roles.primary"));
        assert!(msg.contains("unknown agent"));

        let suggestion = error.suggestion().unwrap();
        assert!(suggestion.contains("roles.primary"));
    }

    #[test]
    fn test_input_too_long_message() {
        let error = Error::InputTooLong { len: 12, max: 10 };
        assert_eq!(
            error.to_string(),
            "input too long: 12 characters (max 10)"
        );
        assert!(error.user_message().contains("limit 10"));
    }

    #[test]
    fn test_session_not_found_suggestion() {
        let error = Error::SessionNotFound(Uuid::nil());
        let output = format_error_for_cli(&error);
        assert!(output.contains("00000000-0000-0000-0000-000000000000"));
        assert!(output.contains("--sessions"));
    }

    #[test]
    fn test_tool_error_conversion() {
        let error: Error = vbg_tools::Error::NotFound("make".to_string()).into();
        assert!(matches!(error, Error::Tool(_)));
        assert!(error.suggestion().is_none());
    }
}
