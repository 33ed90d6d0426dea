//! `partsync status` command implementation
//!
//! Lists pending failure records and counts processed manifests. Nothing is
//! created on disk.

use crate::error::Result;
use colored::Colorize;
use partsync_ingest::config::SyncConfig;
use partsync_ingest::processed::ProcessedLog;
use partsync_ingest::recovery::RecoveryQueue;
use partsync_ingest::tool::redact_url;

/// Show pending failures and processed-log size
pub fn run(config: &SyncConfig) -> Result<()> {
    let records = RecoveryQueue::list(&config.recovery.directory)?;

    if records.is_empty() {
        println!("No pending failure records.");
    } else {
        println!("{}", "Pending failures:".cyan().bold());
        println!();
        for path in &records {
            match RecoveryQueue::read(path) {
                Ok(record) => {
                    println!(
                        "{}",
                        format!("{}/{}", record.table_name, record.partition_name).yellow()
                    );
                    println!("  Manifest:    {}", record.manifest_path.display());
                    println!("  Item:        {}", record.manifest_entry.id);
                    println!("  Source:      {}", record.source_path);
                    println!("  Destination: {}", redact_url(&record.destination_url));
                    println!("  Recorded:    {}", record.recorded_at);
                },
                Err(e) => println!("{} {}", "unreadable".red(), e),
            }
            println!();
        }
    }

    let processed = if config.watch.processed_log.exists() {
        ProcessedLog::load(&config.watch.processed_log)?.len()
    } else {
        0
    };

    println!("{}", "Summary:".cyan().bold());
    println!("  Pending failures:   {}", records.len());
    println!("  Processed files:    {}", processed);
    println!("  Recovery dir:       {}", config.recovery.directory.display());
    println!("  Processed log:      {}", config.watch.processed_log.display());

    Ok(())
}
