//! `partsync drain` command implementation

use crate::error::{CliError, Result};
use colored::Colorize;
use partsync_ingest::config::SyncConfig;
use partsync_ingest::Engine;

/// Replay every pending failure record
pub async fn run(config: &SyncConfig) -> Result<()> {
    let engine = Engine::from_config(config)?;
    let report = engine.queue.drain().await?;

    if report.replayed == 0 && report.unreadable == 0 {
        println!("No pending failure records.");
        return Ok(());
    }

    println!("{}", "Drain:".cyan().bold());
    println!("  Replayed:  {}", report.replayed);
    println!("  Recovered: {}", report.recovered.to_string().green());
    if report.still_pending > 0 {
        println!("  Pending:   {}", report.still_pending.to_string().yellow());
    }
    if report.unreadable > 0 {
        println!("  Unreadable: {}", report.unreadable.to_string().red());
    }
    if report.integrity_failures > 0 {
        println!("  Integrity failures: {}", report.integrity_failures.to_string().red());
    }

    if report.is_clean() {
        Ok(())
    } else {
        Err(CliError::PendingFailures(engine.queue.pending()?.len()))
    }
}
