//! partsync CLI - Main entry point

use clap::Parser;
use partsync_cli::{Cli, Commands, ConfigCommand};
use partsync_common::logging::init_logging;
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    // Values in .env never override variables already set
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Environment variables take precedence over the command defaults
    let log_config = match cli.log_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        },
    };

    // Flushes file logs on drop, so it must live until exit
    let log_guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {}", e);
            None
        },
    };

    if let Err(e) = execute_command(&cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        drop(log_guard);
        process::exit(1);
    }
}

/// Execute the CLI command
async fn execute_command(cli: &Cli) -> partsync_cli::Result<()> {
    let config = cli.load_config()?;

    match &cli.command {
        Commands::Watch {
            directory,
            interval,
            process_existing,
        } => {
            partsync_cli::commands::watch::run(config, directory.clone(), *interval, *process_existing).await
        },

        Commands::Run { manifest } => partsync_cli::commands::run::run(&config, manifest).await,

        Commands::Drain => partsync_cli::commands::drain::run(&config).await,

        Commands::Status => partsync_cli::commands::status::run(&config),

        Commands::CompactLog => partsync_cli::commands::compact_log::run(&config),

        Commands::Verify { local, remote } => partsync_cli::commands::verify::run(&config, local, remote).await,

        Commands::Config { command } => match command {
            ConfigCommand::Show => partsync_cli::commands::config::show(&config),
        },
    }
}
