//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function.

pub mod compact_log;
pub mod config;
pub mod drain;
pub mod run;
pub mod status;
pub mod verify;
pub mod watch;
