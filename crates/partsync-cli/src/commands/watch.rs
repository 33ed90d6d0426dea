//! `partsync watch` command implementation
//!
//! Runs the directory watch loop until Ctrl-C or SIGTERM.

use crate::error::Result;
use colored::Colorize;
use partsync_ingest::config::SyncConfig;
use partsync_ingest::Engine;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info};

/// Watch the configured directory, with command-line overrides applied last
pub async fn run(
    mut config: SyncConfig,
    directory: Option<PathBuf>,
    interval: Option<u64>,
    process_existing: bool,
) -> Result<()> {
    if let Some(directory) = directory {
        config.watch.directory = directory;
    }
    if let Some(interval) = interval {
        config.watch.interval_secs = interval;
    }
    if process_existing {
        config.watch.process_existing_on_start = true;
    }
    config.validate()?;

    let engine = Engine::from_config(&config)?;
    let mut watcher = engine.watcher(&config)?;

    println!(
        "{} Watching {} every {}s (Ctrl-C to stop)",
        "→".cyan(),
        config.watch.directory.display(),
        config.watch.interval_secs
    );
    watcher.run_until(shutdown_signal()).await;
    println!("Stopped.");

    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, stopping after the current tick");
        },
        _ = terminate => {
            info!("Received terminate signal, stopping after the current tick");
        },
    }
}
