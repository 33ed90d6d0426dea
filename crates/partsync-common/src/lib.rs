//! partsync common library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error types, checksum helpers, and logging setup for the partsync
//! workspace.
//!
//! - **Error Handling**: [`SyncError`] and the [`Result`] alias
//! - **Checksums**: streaming SHA-256 digests for files and directory trees
//! - **Logging**: `tracing` subscriber initialization
//!
//! # Example
//!
//! ```no_run
//! use partsync_common::checksum::compute_tree_checksum;
//! use partsync_common::Result;
//!
//! fn digest_partition(path: &str) -> Result<()> {
//!     let digest = compute_tree_checksum(path)?;
//!     tracing::info!(%digest, "partition digest");
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;

pub use error::{Result, SyncError};
