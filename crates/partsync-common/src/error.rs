//! Error types for partsync

use std::path::Path;
use thiserror::Error;

/// Result type alias for partsync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Main error type for partsync
///
/// Expected transfer failures are reported as values by the transfer layer;
/// `TransferFailed` only surfaces where a caller asked for a hard error, such
/// as a failed download during integrity verification.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Failed to parse '{path}': {message}")]
    Parse { path: String, message: String },

    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    #[error("Integrity mismatch for '{path}': local {local}, remote {remote}")]
    IntegrityMismatch {
        path: String,
        local: String,
        remote: String,
    },

    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Classify an IO error raised while touching `path`.
    ///
    /// Missing paths and denied access map onto their own variants so callers
    /// can stop just the affected unit of work.
    pub fn from_io(path: impl AsRef<Path>, err: std::io::Error) -> Self {
        let display = path.as_ref().display().to_string();
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(display),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(display),
            _ => Self::Io(err),
        }
    }

    /// Create a parse error for the file at `path`
    pub fn parse(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.as_ref().display().to_string(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for errors that must never be retried without operator attention
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::IntegrityMismatch { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_from_io_classifies_kinds() {
        let err = SyncError::from_io("/x", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, SyncError::NotFound(p) if p == "/x"));

        let err = SyncError::from_io("/y", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, SyncError::PermissionDenied(p) if p == "/y"));

        let err = SyncError::from_io("/z", io::Error::from(io::ErrorKind::InvalidData));
        assert!(matches!(err, SyncError::Io(_)));
    }

    #[test]
    fn test_is_integrity() {
        let err = SyncError::IntegrityMismatch {
            path: "p".into(),
            local: "a".into(),
            remote: "b".into(),
        };
        assert!(err.is_integrity());
        assert!(!SyncError::TransferFailed("x".into()).is_integrity());
    }
}
