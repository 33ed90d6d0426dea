//! `partsync run` command implementation
//!
//! Replicates a single manifest and then replays pending failures.

use crate::error::{CliError, Result};
use colored::Colorize;
use partsync_ingest::config::SyncConfig;
use partsync_ingest::Engine;
use std::path::Path;

/// Replicate `manifest` once
pub async fn run(config: &SyncConfig, manifest: &Path) -> Result<()> {
    config.validate()?;
    let engine = Engine::from_config(config)?;

    let summary = engine.orchestrator.run(manifest).await?;
    let report = engine.queue.drain().await?;

    println!("{} {}", "Manifest:".cyan().bold(), manifest.display());
    println!("  Entries:    {}", summary.entries);
    println!("  Partitions: {}", summary.units);
    println!("  Copied:     {}", summary.succeeded.to_string().green());
    if summary.failed > 0 {
        println!("  Failed:     {}", summary.failed.to_string().red());
    }
    if report.replayed > 0 {
        println!("  Recovered:  {}", report.recovered);
    }

    let pending = engine.queue.pending()?.len();
    if pending > 0 {
        return Err(CliError::PendingFailures(pending));
    }
    Ok(())
}
