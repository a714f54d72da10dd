//! Error types for LeadScout.
//!
//! Library crates use [`LeadscoutError`] via `thiserror`.
//! The CLI app wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all LeadScout operations.
#[derive(Debug, thiserror::Error)]
pub enum LeadscoutError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error during fetch or probing.
    #[error("network error: {0}")]
    Network(String),

    /// HTML parsing or field extraction error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Checkpoint ledger read/write error. Fatal to the running job.
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (missing required field, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Export serialization or write error.
    #[error("export error: {0}")]
    Export(String),

    /// The job was cancelled before completion.
    #[error("cancelled")]
    Cancelled,

    /// The stealth session budget is spent; the run must wind down.
    #[error("session duration ceiling reached")]
    SessionExpired,
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LeadscoutError>;

impl LeadscoutError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = LeadscoutError::config("missing output directory");
        assert_eq!(err.to_string(), "config error: missing output directory");

        let err = LeadscoutError::validation("postal code must be 5 digits");
        assert!(err.to_string().contains("5 digits"));
    }
}
