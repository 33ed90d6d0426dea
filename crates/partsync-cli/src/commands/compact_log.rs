//! `partsync compact-log` command implementation

use crate::error::Result;
use colored::Colorize;
use partsync_ingest::config::SyncConfig;
use partsync_ingest::processed::ProcessedLog;

/// Rewrite the processed-files log without duplicate or stale entries
pub fn run(config: &SyncConfig) -> Result<()> {
    let mut log = ProcessedLog::load(&config.watch.processed_log)?;
    let report = log.compact()?;

    println!(
        "{} Compacted {}",
        "✓".green(),
        config.watch.processed_log.display()
    );
    println!("  Kept:               {}", report.kept);
    println!("  Duplicates removed: {}", report.duplicates_removed);
    println!("  Missing removed:    {}", report.missing_removed);

    Ok(())
}
