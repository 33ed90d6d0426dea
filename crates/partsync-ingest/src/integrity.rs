//! Post-transfer integrity verification
//!
//! Downloads the replica into a scoped temporary directory and compares its
//! content digest with the local source. The temporary directory is removed
//! when verification returns, on every path.

use crate::tool::{redact_url, CopyTool};
use partsync_common::checksum::compute_tree_checksum;
use partsync_common::{Result, SyncError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

pub struct IntegrityVerifier {
    tool: Arc<dyn CopyTool>,
}

impl IntegrityVerifier {
    pub fn new(tool: Arc<dyn CopyTool>) -> Self {
        Self { tool }
    }

    /// Confirm the replica at `remote_url` is byte-identical to `local`.
    ///
    /// A failed download is `TransferFailed`; differing content is
    /// `IntegrityMismatch`.
    pub async fn verify(&self, local: &Path, remote_url: &str) -> Result<()> {
        let local_digest = digest(local.to_path_buf()).await?;
        debug!(path = %local.display(), digest = %local_digest, "Computed local digest");

        let scratch = tempfile::Builder::new()
            .prefix("partsync-verify-")
            .tempdir()?;

        self.tool
            .download(remote_url, scratch.path())
            .await
            .map_err(|e| {
                SyncError::TransferFailed(format!(
                    "download of {} failed: {}",
                    redact_url(remote_url),
                    e
                ))
            })?;

        let downloaded = match local.file_name() {
            Some(name) if scratch.path().join(name).exists() => scratch.path().join(name),
            _ => scratch.path().to_path_buf(),
        };
        let remote_digest = digest(downloaded).await?;

        if local_digest == remote_digest {
            info!(
                path = %local.display(),
                remote = redact_url(remote_url),
                digest = %local_digest,
                "Replica integrity verified"
            );
            Ok(())
        } else {
            error!(
                path = %local.display(),
                remote = redact_url(remote_url),
                local_digest = %local_digest,
                remote_digest = %remote_digest,
                "Replica integrity check failed"
            );
            Err(SyncError::IntegrityMismatch {
                path: local.display().to_string(),
                local: local_digest,
                remote: remote_digest,
            })
        }
    }
}

async fn digest(path: PathBuf) -> Result<String> {
    tokio::task::spawn_blocking(move || compute_tree_checksum(&path))
        .await
        .map_err(|e| SyncError::Io(std::io::Error::other(e)))?
}
