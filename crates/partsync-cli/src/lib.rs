//! partsync CLI Library
//!
//! Command-line interface for the partition replication engine.
//!
//! # Overview
//!
//! - **Watching**: Poll a directory and replicate every new manifest (`partsync watch`)
//! - **One-shot runs**: Replicate a single manifest (`partsync run`)
//! - **Recovery**: Replay failed partitions (`partsync drain`)
//! - **Status**: Show pending failures and processed manifests (`partsync status`)
//! - **Maintenance**: Compact the processed-files log (`partsync compact-log`)
//! - **Verification**: Compare a local tree with its replica (`partsync verify`)
//! - **Configuration**: Print the effective settings (`partsync config show`)

pub mod commands;
pub mod error;

pub use error::{CliError, Result};

use clap::{Parser, Subcommand};
use partsync_common::logging::{LogConfig, LogLevel, LogOutput};
use partsync_ingest::config::SyncConfig;
use std::path::PathBuf;

/// partsync - replicate table partitions to blob storage
#[derive(Parser, Debug)]
#[command(name = "partsync")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a TOML configuration file
    #[arg(short, long, env = "PARTSYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch a directory and replicate new manifests until interrupted
    Watch {
        /// Directory to watch (overrides watch.directory)
        #[arg(short, long)]
        directory: Option<PathBuf>,

        /// Poll interval in seconds (overrides watch.interval_secs)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Also dispatch manifests already present at startup
        #[arg(long)]
        process_existing: bool,
    },

    /// Replicate one manifest, then replay pending failures
    Run {
        /// Manifest file to replicate
        manifest: PathBuf,
    },

    /// Replay pending failure records
    Drain,

    /// Show pending failure records and processed manifests
    Status,

    /// Remove duplicate and stale entries from the processed-files log
    CompactLog,

    /// Compare a local file or directory with its remote replica
    Verify {
        /// Local file or directory
        local: PathBuf,

        /// Remote URL of the replica, including any SAS token
        remote: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
}

impl Cli {
    /// Load the file and environment layers of the configuration
    pub fn load_config(&self) -> Result<SyncConfig> {
        Ok(SyncConfig::load(self.config.as_deref())?)
    }

    /// Console logging at the command's default level.
    ///
    /// Long-running watch logs at info, one-shot commands only warn.
    pub fn default_log_config(&self) -> LogConfig {
        let level = match (&self.command, self.verbose) {
            (_, true) => LogLevel::Debug,
            (Commands::Watch { .. }, false) => LogLevel::Info,
            _ => LogLevel::Warn,
        };
        LogConfig::builder()
            .level(level)
            .output(LogOutput::Console)
            .log_file_prefix("partsync")
            .build()
    }

    /// Default logging with `PARTSYNC_LOG_*` overrides applied
    pub fn log_config(&self) -> Result<LogConfig> {
        Ok(self.default_log_config().with_env_overrides()?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_watch_overrides() {
        let cli = Cli::try_parse_from([
            "partsync",
            "--config",
            "partsync.toml",
            "watch",
            "--directory",
            "/inbound",
            "--interval",
            "5",
            "--process-existing",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("partsync.toml")));
        match cli.command {
            Commands::Watch {
                directory,
                interval,
                process_existing,
            } => {
                assert_eq!(directory, Some(PathBuf::from("/inbound")));
                assert_eq!(interval, Some(5));
                assert!(process_existing);
            },
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_verify() {
        let cli = Cli::try_parse_from(["partsync", "-v", "verify", "/db/t/p1", "https://a/c/f/t/p1?sig"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Verify { .. }));
    }

    #[test]
    fn test_default_log_level_follows_command() {
        let watch = Cli::try_parse_from(["partsync", "watch"]).unwrap();
        assert_eq!(watch.default_log_config().level, LogLevel::Info);

        let drain = Cli::try_parse_from(["partsync", "drain"]).unwrap();
        assert_eq!(drain.default_log_config().level, LogLevel::Warn);

        let verbose = Cli::try_parse_from(["partsync", "--verbose", "drain"]).unwrap();
        assert_eq!(verbose.default_log_config().level, LogLevel::Debug);
        assert_eq!(verbose.default_log_config().output, LogOutput::Console);
    }

    #[test]
    fn test_run_requires_manifest() {
        assert!(Cli::try_parse_from(["partsync", "run"]).is_err());
    }
}
