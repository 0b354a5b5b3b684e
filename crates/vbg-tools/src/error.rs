//! Error types for vbg-tools

use thiserror::Error;

/// Tool error type
#[derive(Debug, Error)]
pub enum Error {
    /// Binary could not be located
    #[error("binary not found: {0}")]
    NotFound(String),

    /// Process ran but did not complete successfully
    #[error("execution failed: {0}")]
    Execution(String),

    /// Timeout
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
