//! Error types for the partsync CLI
//!
//! Engine errors are wrapped with a hint on what the operator can do next.

use partsync_common::SyncError;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration is missing or invalid
    #[error("{0}. Check the config file or PARTSYNC_* environment variables.")]
    Config(String),

    /// Replica content differs from the local source
    #[error("{0}. The replica was not removed; inspect it before re-running.")]
    Integrity(String),

    /// Failure records remain after a drain
    #[error("{0} failure record(s) still pending. Run 'partsync status' to list them.")]
    PendingFailures(usize),

    /// Any other engine error
    #[error(transparent)]
    Sync(SyncError),

    /// Failed to render configuration
    #[error("Failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),

    /// Logging settings could not be applied
    #[error("{0}. Check the PARTSYNC_LOG_* environment variables.")]
    Logging(#[from] anyhow::Error),
}

impl From<SyncError> for CliError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Config(_) => Self::Config(err.to_string()),
            SyncError::IntegrityMismatch { .. } => Self::Integrity(err.to_string()),
            other => Self::Sync(other),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_errors_are_classified() {
        let err: CliError = SyncError::config("destination.base_url is required").into();
        assert!(matches!(err, CliError::Config(_)));

        let err: CliError = SyncError::IntegrityMismatch {
            path: "/db/t/p1".into(),
            local: "aa".into(),
            remote: "bb".into(),
        }
        .into();
        assert!(err.to_string().contains("Integrity mismatch"));

        let err: CliError = SyncError::NotFound("/x".into()).into();
        assert_eq!(err.to_string(), "Not found: /x");
    }

    #[test]
    fn test_logging_error_names_variables() {
        let err: CliError = "loud".parse::<partsync_common::logging::LogLevel>().unwrap_err().into();
        assert_eq!(
            err.to_string(),
            "Invalid log level: loud. Check the PARTSYNC_LOG_* environment variables."
        );
    }
}
