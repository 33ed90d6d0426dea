//! `partsync config` command implementation
//!
//! Prints the configuration after file and environment layers are applied.

use crate::error::Result;
use colored::Colorize;
use partsync_ingest::config::SyncConfig;

const REDACTED: &str = "<redacted>";

/// Show the effective configuration as TOML
pub fn show(config: &SyncConfig) -> Result<()> {
    println!("{}", "Effective configuration:".cyan().bold());
    println!();
    print!("{}", render(config)?);
    println!();
    println!("{}", "Environment Variables:".cyan());
    println!("  PARTSYNC_CONFIG      - Configuration file");
    println!("  PARTSYNC_BASE_URL    - Destination base URL");
    println!("  PARTSYNC_AUTH_TOKEN  - Token appended to destination URLs");
    println!("  PARTSYNC_WATCH_DIR   - Directory to watch");
    println!("  PARTSYNC_LOG_LEVEL   - Log level (trace, debug, info, warn, error)");

    Ok(())
}

fn render(config: &SyncConfig) -> Result<String> {
    let mut shown = config.clone();
    if shown.destination.auth_token.is_some() {
        shown.destination.auth_token = Some(REDACTED.to_string());
    }
    Ok(toml::to_string_pretty(&shown)?)
}
