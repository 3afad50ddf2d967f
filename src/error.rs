//! Error handling for scope-export parsing operations.
//!
//! Only conditions the caller must act on are errors: unreadable input,
//! malformed options or rules, and report persistence failures. Content-level
//! anomalies (no header, short rows, validation rejects) are recovered inside
//! the parser and recorded in the structure info instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid option '{option}': {reason}")]
    InvalidOption { option: String, reason: String },

    #[error("Invalid validation rule for column '{column}': {reason}")]
    InvalidRule { column: String, reason: String },

    #[error("Failed to write parsing report to {path}: {source}")]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl ParserError {
    /// Map an I/O error raised while reading `path`, promoting `NotFound`.
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound { path }
        } else {
            Self::Io { path, source }
        }
    }

    pub fn invalid_option(option: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            option: option.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_rule(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRule {
            column: column.into(),
            reason: reason.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ParserError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_promoted() {
        let err = ParserError::from_io(
            "missing.csv",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, ParserError::FileNotFound { .. }));
        assert_eq!(err.to_string(), "File not found: missing.csv");
    }

    #[test]
    fn test_other_io_errors_keep_source() {
        let err = ParserError::from_io(
            "locked.csv",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, ParserError::Io { .. }));
        assert!(std::error::Error::source(&err).is_some());
    }
}
