//! Directory watch loop
//!
//! Polls the watched directory on a fixed interval. Each tick checks available
//! memory, takes a fresh snapshot, and dispatches every file that is new or
//! whose modification time changed and that has not been processed before.
//! Dispatching a file runs its manifest, drains the recovery queue, and then
//! appends the file to the processed log.

use crate::config::WatchConfig;
use crate::orchestrator::Orchestrator;
use crate::probe::MemoryGate;
use crate::processed::ProcessedLog;
use crate::recovery::RecoveryQueue;
use partsync_common::{Result, SyncError};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Scanning,
    Dispatching,
}

/// Regular files in the watched directory and their modification times
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectorySnapshot {
    files: BTreeMap<PathBuf, SystemTime>,
}

impl DirectorySnapshot {
    /// Capture the top-level regular files of `dir`, optionally filtered by extension.
    /// An empty extension accepts every file. Names containing a line break
    /// cannot be kept in the processed log and are skipped.
    pub fn capture(dir: &Path, extension: Option<&str>) -> Result<Self> {
        let extension = extension.filter(|ext| !ext.is_empty());
        let mut files = BTreeMap::new();
        for entry in std::fs::read_dir(dir).map_err(|e| SyncError::from_io(dir, e))? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_name().to_string_lossy().contains(['\n', '\r']) {
                warn!(file = ?path, "Skipping file with a line break in its name");
                continue;
            }
            if let Some(ext) = extension {
                if path.extension().and_then(|e| e.to_str()) != Some(ext) {
                    continue;
                }
            }

            // Files may disappear between listing and stat
            let metadata = match std::fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(SyncError::from_io(&path, e)),
            };
            if metadata.is_file() {
                files.insert(path, metadata.modified()?);
            }
        }
        Ok(Self { files })
    }

    /// Files that are new in `self` or whose modification time differs from `previous`
    pub fn changed_since(&self, previous: &DirectorySnapshot) -> Vec<PathBuf> {
        self.files
            .iter()
            .filter(|(path, modified)| previous.files.get(*path) != Some(*modified))
            .map(|(path, _)| path.clone())
            .collect()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickReport {
    /// Resource check failed; nothing was scanned
    Skipped(String),
    Completed { dispatched: usize, failed: usize },
}

pub struct DirectoryWatcher {
    config: WatchConfig,
    orchestrator: Arc<Orchestrator>,
    queue: Arc<RecoveryQueue>,
    gate: MemoryGate,
    snapshot: DirectorySnapshot,
    processed: ProcessedLog,
    state: WatchState,
}

impl DirectoryWatcher {
    /// Load the processed log and take the initial snapshot
    pub fn new(
        config: WatchConfig,
        orchestrator: Arc<Orchestrator>,
        queue: Arc<RecoveryQueue>,
        gate: MemoryGate,
    ) -> Result<Self> {
        let processed = ProcessedLog::load(&config.processed_log)?;
        let snapshot = if config.process_existing_on_start {
            DirectorySnapshot::default()
        } else {
            DirectorySnapshot::capture(&config.directory, config.extension.as_deref())?
        };

        info!(
            directory = %config.directory.display(),
            existing = snapshot.len(),
            processed = processed.len(),
            "Watcher initialized"
        );

        Ok(Self {
            config,
            orchestrator,
            queue,
            gate,
            snapshot,
            processed,
            state: WatchState::Idle,
        })
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn snapshot(&self) -> &DirectorySnapshot {
        &self.snapshot
    }

    pub fn processed(&self) -> &ProcessedLog {
        &self.processed
    }

    /// Run one scan-and-dispatch cycle.
    ///
    /// Per-file failures are logged and counted; only a failed scan is an error.
    pub async fn tick(&mut self) -> Result<TickReport> {
        if let Err(e) = self.gate.check() {
            warn!(error = %e, "Skipping scan, insufficient resources");
            return Ok(TickReport::Skipped(e.to_string()));
        }

        self.state = WatchState::Scanning;
        let current = match DirectorySnapshot::capture(&self.config.directory, self.config.extension.as_deref()) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.state = WatchState::Idle;
                return Err(e);
            },
        };

        let pending: Vec<PathBuf> = current
            .changed_since(&self.snapshot)
            .into_iter()
            .filter(|path| !self.processed.contains(path))
            .collect();
        debug!(files = current.len(), pending = pending.len(), "Scanned watch directory");

        self.state = WatchState::Dispatching;
        let mut dispatched = 0;
        let mut failed = 0;
        for path in pending {
            match self.dispatch(&path).await {
                Ok(()) => dispatched += 1,
                Err(e) => {
                    failed += 1;
                    error!(file = %path.display(), error = %e, "Dispatch failed, file not marked processed");
                },
            }
        }

        self.snapshot = current;
        self.state = WatchState::Idle;
        Ok(TickReport::Completed { dispatched, failed })
    }

    async fn dispatch(&mut self, path: &Path) -> Result<()> {
        info!(file = %path.display(), "Dispatching manifest");
        let run = self.orchestrator.run(path).await;

        match self.queue.drain().await {
            Ok(report) if !report.is_clean() => {
                warn!(still_pending = report.still_pending, "Failure records remain after drain");
            },
            Ok(_) => {},
            Err(e) => error!(error = %e, "Failed to drain recovery queue"),
        }

        let summary = run?;
        self.processed.record(path)?;
        info!(
            file = %path.display(),
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Manifest dispatched"
        );
        Ok(())
    }

    /// Tick on the configured interval until `shutdown` resolves.
    ///
    /// Shutdown is only observed between ticks, so an in-flight copy is
    /// always allowed to finish.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(
            directory = %self.config.directory.display(),
            interval_secs = self.config.interval_secs,
            "Watching for manifests"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping watcher");
                    break;
                },
                _ = tokio::time::sleep(self.config.interval()) => {},
            }

            match self.tick().await {
                Ok(TickReport::Completed { dispatched, failed }) if dispatched + failed > 0 => {
                    info!(dispatched, failed, "Tick completed");
                },
                Ok(_) => {},
                Err(e) => error!(error = %e, "Scan failed"),
            }
        }
    }
}
