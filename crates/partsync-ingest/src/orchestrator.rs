//! Manifest orchestration
//!
//! Loads a manifest, expands every entry into transfer units and drives each
//! unit through the executor in order. A unit that cannot be copied becomes a
//! failure record and the batch moves on. A replica that fails verification
//! is not recorded; the remaining units still run and the first mismatch is
//! returned once the manifest is finished. Re-running a manifest copies every
//! unit again; the copy tool's length and checksum checks make the repeated
//! copy converge on the same destination content.

use crate::config::DestinationConfig;
use crate::manifest::{self, ManifestEntry};
use crate::partition::{PartitionEnumerator, TransferUnit};
use crate::recovery::{FailureRecord, RecoveryQueue};
use crate::tool::redact_url;
use crate::transfer::{TransferExecutor, TransferOutcome};
use partsync_common::{Result, SyncError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Counts from one manifest run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub entries: usize,
    pub units: usize,
    pub succeeded: usize,
    pub failed: usize,
}

pub struct Orchestrator {
    executor: Arc<TransferExecutor>,
    queue: Arc<RecoveryQueue>,
    enumerator: PartitionEnumerator,
}

impl Orchestrator {
    pub fn new(
        executor: Arc<TransferExecutor>,
        queue: Arc<RecoveryQueue>,
        destination: DestinationConfig,
        source_root: PathBuf,
    ) -> Self {
        Self {
            executor,
            queue,
            enumerator: PartitionEnumerator::new(source_root, destination),
        }
    }

    /// Replicate every partition named by the manifest at `manifest_path`.
    ///
    /// Manifest load errors are returned immediately. An integrity mismatch
    /// counts its unit as failed and is returned after every other unit has
    /// run. Every other per-unit failure is recorded in the recovery queue.
    pub async fn run(&self, manifest_path: &Path) -> Result<RunSummary> {
        let entries = manifest::load(manifest_path)?;
        let mut summary = RunSummary {
            entries: entries.len(),
            ..RunSummary::default()
        };

        info!(manifest = %manifest_path.display(), entries = entries.len(), "Processing manifest");

        let mut mismatch: Option<SyncError> = None;
        for entry in &entries {
            for unit in self.enumerator.enumerate(entry) {
                summary.units += 1;
                match self.process_unit(manifest_path, entry, unit).await {
                    Ok(true) => summary.succeeded += 1,
                    Ok(false) => summary.failed += 1,
                    Err(e) if e.is_integrity() => {
                        summary.failed += 1;
                        mismatch.get_or_insert(e);
                    },
                    Err(e) => return Err(e),
                }
            }
        }

        if summary.failed == 0 {
            info!(
                manifest = %manifest_path.display(),
                units = summary.units,
                "Manifest replicated"
            );
        } else {
            warn!(
                manifest = %manifest_path.display(),
                units = summary.units,
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Manifest replicated with failures"
            );
        }
        match mismatch {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }

    async fn process_unit(&self, manifest_path: &Path, entry: &ManifestEntry, unit: TransferUnit) -> Result<bool> {
        if let Err(e) = validate_source(Path::new(&unit.source_path)) {
            error!(
                id = %entry.id,
                table = %unit.table_name,
                partition = %unit.partition_name,
                error = %e,
                "Partition source unavailable"
            );
            self.queue.enqueue(&FailureRecord::new(manifest_path, entry.clone(), unit))?;
            return Ok(false);
        }

        let outcome = match self.executor.run(&unit.source_path, &unit.destination_url).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    manifest = %manifest_path.display(),
                    id = %entry.id,
                    table = %unit.table_name,
                    partition = %unit.partition_name,
                    destination = redact_url(&unit.destination_url),
                    error = %e,
                    "Replica failed verification"
                );
                return Err(e);
            },
        };

        match outcome {
            TransferOutcome::Success => Ok(true),
            TransferOutcome::Failed(reason) => {
                warn!(
                    id = %entry.id,
                    table = %unit.table_name,
                    partition = %unit.partition_name,
                    error = %reason,
                    "Partition transfer failed"
                );
                self.queue.enqueue(&FailureRecord::new(manifest_path, entry.clone(), unit))?;
                Ok(false)
            },
        }
    }
}

/// Ensure a partition source exists and can be read before it is copied
pub fn validate_source(path: &Path) -> Result<()> {
    let metadata = std::fs::metadata(path).map_err(|e| SyncError::from_io(path, e))?;
    if metadata.is_dir() {
        std::fs::read_dir(path).map_err(|e| SyncError::from_io(path, e))?;
    } else {
        std::fs::File::open(path).map_err(|e| SyncError::from_io(path, e))?;
    }
    Ok(())
}
