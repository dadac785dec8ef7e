//! Error types for reelsmith.
//!
//! Library crates use [`ReelsmithError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Malformed input records and collaborator failures are *not* errors: they
//! are collected as values and counted in the relevant report.

use std::path::PathBuf;

/// Top-level error type for all reelsmith operations.
#[derive(Debug, thiserror::Error)]
pub enum ReelsmithError {
    /// Configuration loading or validation error. Fatal, raised before any
    /// record is processed.
    #[error("config error: {message}")]
    Config { message: String },

    /// A records, manifest, or report file could not be decoded.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (unknown manifest, schema mismatch, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Artifact serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ReelsmithError>;

impl ReelsmithError {
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

impl From<serde_json::Error> for ReelsmithError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ReelsmithError::config("category list is empty");
        assert_eq!(err.to_string(), "config error: category list is empty");

        let err = ReelsmithError::validation("manifest 'x' not found");
        assert!(err.to_string().contains("manifest 'x'"));
    }

    #[test]
    fn io_error_carries_path() {
        let err = ReelsmithError::io(
            "/tmp/records.json",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("/tmp/records.json"));
    }
}
