//! partsync ingestion and replication engine
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Watches a directory for ingestion manifests, expands each manifest into
//! table partitions, and replicates every partition to a blob store through an
//! external copy tool. Failed partitions are persisted as individual records
//! and replayed on later passes.
//!
//! # Pipeline
//!
//! - [`watch::DirectoryWatcher`] polls the watched directory and dispatches
//!   new or changed manifests it has not processed before
//! - [`manifest::load`] reads a manifest into typed entries
//! - [`partition::PartitionEnumerator`] expands an entry into transfer units
//! - [`orchestrator::Orchestrator`] drives each unit through the
//!   [`transfer::TransferExecutor`]
//! - [`recovery::RecoveryQueue`] stores and replays failed units
//!
//! # Example
//!
//! ```no_run
//! use partsync_ingest::config::SyncConfig;
//! use partsync_ingest::Engine;
//!
//! #[tokio::main]
//! async fn main() -> partsync_common::Result<()> {
//!     let config = SyncConfig::load(Some("partsync.toml".as_ref()))?;
//!     let engine = Engine::from_config(&config)?;
//!     let summary = engine.orchestrator.run("inbound/batch-01.json".as_ref()).await?;
//!     println!("{} partitions copied", summary.succeeded);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod integrity;
pub mod manifest;
pub mod orchestrator;
pub mod partition;
pub mod probe;
pub mod processed;
pub mod recovery;
pub mod tool;
pub mod transfer;
pub mod watch;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use config::SyncConfig;
use integrity::IntegrityVerifier;
use orchestrator::Orchestrator;
use partsync_common::Result;
use probe::{MemoryGate, SystemMemoryProbe};
use recovery::RecoveryQueue;
use tool::CommandCopyTool;
use transfer::{RetryPolicy, TransferExecutor};
use watch::DirectoryWatcher;

/// Fully wired set of engine components built from a [`SyncConfig`]
pub struct Engine {
    pub executor: Arc<TransferExecutor>,
    pub queue: Arc<RecoveryQueue>,
    pub orchestrator: Arc<Orchestrator>,
}

impl Engine {
    /// Wire the production copy tool, executor, queue, and orchestrator
    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        let tool = Arc::new(CommandCopyTool::from_config(&config.transfer, config.credentials.clone()));

        let mut executor = TransferExecutor::new(tool.clone(), RetryPolicy::from_config(&config.transfer));
        if config.transfer.verify_integrity {
            executor = executor.with_verifier(IntegrityVerifier::new(tool));
        }
        let executor = Arc::new(executor);

        let queue = Arc::new(RecoveryQueue::open(&config.recovery.directory, executor.clone())?);
        let orchestrator = Arc::new(Orchestrator::new(
            executor.clone(),
            queue.clone(),
            config.destination.clone(),
            config.source_root.clone(),
        ));

        Ok(Self {
            executor,
            queue,
            orchestrator,
        })
    }

    /// Build a watcher over the configured directory using the system memory probe
    pub fn watcher(&self, config: &SyncConfig) -> Result<DirectoryWatcher> {
        let gate = MemoryGate::new(
            Box::new(SystemMemoryProbe),
            config.resources.min_available_memory_mb,
        );
        DirectoryWatcher::new(
            config.watch.clone(),
            self.orchestrator.clone(),
            self.queue.clone(),
            gate,
        )
    }
}
