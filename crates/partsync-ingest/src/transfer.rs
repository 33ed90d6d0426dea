//! Transfer execution with bounded retries
//!
//! A transfer is one `copy` of a local partition to its destination URL. Each
//! attempt runs the tool login (when configured) immediately before the copy;
//! a failure of either consumes one attempt. Attempts are separated by a fixed
//! delay. Running out of attempts is an expected outcome and is returned as
//! [`TransferOutcome::Failed`], never as an error.
//!
//! With an [`IntegrityVerifier`] attached, every successful copy is followed
//! by a download-and-compare. A failed download counts as a failed attempt; a
//! content mismatch aborts immediately with `IntegrityMismatch`.

use crate::config::TransferConfig;
use crate::integrity::IntegrityVerifier;
use crate::tool::{redact_url, CopyTool};
use partsync_common::{Result, SyncError};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Result of driving one transfer to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Success,
    Failed(String),
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TransferOutcome::Success)
    }
}

/// Attempt budget and fixed backoff for a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Never less than 1.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &TransferConfig) -> Self {
        Self::new(config.retries, config.retry_delay())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            crate::config::DEFAULT_RETRIES,
            Duration::from_secs(crate::config::DEFAULT_RETRY_DELAY_SECS),
        )
    }
}

enum AttemptError {
    Failed(String),
    Integrity(SyncError),
}

pub struct TransferExecutor {
    tool: Arc<dyn CopyTool>,
    policy: RetryPolicy,
    verifier: Option<IntegrityVerifier>,
}

impl TransferExecutor {
    pub fn new(tool: Arc<dyn CopyTool>, policy: RetryPolicy) -> Self {
        Self {
            tool,
            policy,
            verifier: None,
        }
    }

    /// Verify every replica after a successful copy
    pub fn with_verifier(mut self, verifier: IntegrityVerifier) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Copy `source` to `destination`, returning whether it eventually succeeded.
    ///
    /// Only an integrity mismatch is reported as an error.
    pub async fn transfer(&self, source: &str, destination: &str) -> Result<bool> {
        Ok(self.run(source, destination).await?.is_success())
    }

    /// Copy `source` to `destination` under the retry policy
    pub async fn run(&self, source: &str, destination: &str) -> Result<TransferOutcome> {
        let target = redact_url(destination);
        let max_attempts = self.policy.max_attempts;
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            info!(source, destination = target, attempt, max_attempts, "Starting transfer");

            match self.attempt(source, destination).await {
                Ok(()) => {
                    info!(source, destination = target, attempt, "Transfer succeeded");
                    return Ok(TransferOutcome::Success);
                },
                Err(AttemptError::Integrity(err)) => {
                    error!(source, destination = target, error = %err, "Aborting transfer after integrity failure");
                    return Err(err);
                },
                Err(AttemptError::Failed(reason)) => {
                    warn!(
                        source,
                        destination = target,
                        attempt,
                        max_attempts,
                        error = %reason,
                        "Transfer attempt failed"
                    );
                    last_error = reason;

                    if attempt < max_attempts {
                        info!(source, delay_secs = self.policy.delay.as_secs(), "Retrying transfer after delay");
                        tokio::time::sleep(self.policy.delay).await;
                    }
                },
            }
        }

        error!(source, destination = target, attempts = max_attempts, error = %last_error, "All transfer attempts failed");
        Ok(TransferOutcome::Failed(format!(
            "{} attempt(s) failed, last error: {}",
            max_attempts, last_error
        )))
    }

    async fn attempt(&self, source: &str, destination: &str) -> std::result::Result<(), AttemptError> {
        self.tool
            .login()
            .await
            .map_err(|e| AttemptError::Failed(format!("login failed: {}", e)))?;

        self.tool
            .copy(source, destination)
            .await
            .map_err(|e| AttemptError::Failed(e.to_string()))?;

        if let Some(verifier) = &self.verifier {
            let replica = replica_url(destination, source);
            match verifier.verify(Path::new(source), &replica).await {
                Ok(()) => {},
                Err(err) if err.is_integrity() => return Err(AttemptError::Integrity(err)),
                Err(err) => return Err(AttemptError::Failed(format!("verification failed: {}", err))),
            }
        }

        Ok(())
    }
}

/// URL of the replica a recursive copy of `source` creates under `destination`.
///
/// The source's final path component is inserted ahead of any query string.
pub fn replica_url(destination: &str, source: &str) -> String {
    let name = Path::new(source)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let (base, query) = match destination.find('?') {
        Some(idx) => destination.split_at(idx),
        None => (destination, ""),
    };
    format!("{}/{}{}", base.trim_end_matches('/'), name, query)
}
