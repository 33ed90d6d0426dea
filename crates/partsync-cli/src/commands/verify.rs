//! `partsync verify` command implementation
//!
//! Downloads a replica and compares its digest with the local source.

use crate::error::Result;
use colored::Colorize;
use partsync_common::SyncError;
use partsync_ingest::config::SyncConfig;
use partsync_ingest::integrity::IntegrityVerifier;
use partsync_ingest::tool::{redact_url, CommandCopyTool, CopyTool};
use std::path::Path;
use std::sync::Arc;

/// Verify that `remote` holds the same content as `local`
pub async fn run(config: &SyncConfig, local: &Path, remote: &str) -> Result<()> {
    let tool = Arc::new(CommandCopyTool::from_config(&config.transfer, config.credentials.clone()));
    tool.login()
        .await
        .map_err(|e| SyncError::TransferFailed(format!("login failed: {}", e)))?;

    IntegrityVerifier::new(tool).verify(local, remote).await?;

    println!(
        "{} {} matches {}",
        "✓".green(),
        local.display(),
        redact_url(remote)
    );
    Ok(())
}
