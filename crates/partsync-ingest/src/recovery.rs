//! Durable failure-recovery queue
//!
//! Every partition that exhausts its retries is written as its own JSON file
//! in the recovery directory. The file name is derived from the unit identity,
//! so a repeated failure overwrites the earlier record instead of adding one.
//! Records are written to a temporary file in the same directory and renamed
//! into place, so a crash never leaves a half-written record behind. Temporary
//! files orphaned by a crash are removed when the queue is opened.
//!
//! [`RecoveryQueue::drain`] replays every record through the executor and
//! deletes a record only after its replay succeeded.

use crate::manifest::ManifestEntry;
use crate::partition::TransferUnit;
use crate::tool::redact_url;
use crate::transfer::{TransferExecutor, TransferOutcome};
use chrono::{DateTime, Utc};
use partsync_common::{Result, SyncError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info, warn};

const RECORD_EXTENSION: &str = "json";
const RECORD_TEMP_PREFIX: &str = ".partsync-record-";
/// Younger temporaries may belong to an enqueue running in another process
const ORPHAN_MIN_AGE: Duration = Duration::from_secs(600);
const SLUG_MAX_LEN: usize = 40;

/// A transfer unit that has not yet been copied successfully
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    #[serde(rename = "ingestion_file")]
    pub manifest_path: PathBuf,
    #[serde(rename = "ingestion_item")]
    pub manifest_entry: ManifestEntry,
    #[serde(rename = "ingestion_table")]
    pub table_name: String,
    #[serde(rename = "ingestion_partition")]
    pub partition_name: String,
    #[serde(rename = "partition_source")]
    pub source_path: String,
    #[serde(rename = "partition_destination")]
    pub destination_url: String,
    pub recorded_at: DateTime<Utc>,
}

impl FailureRecord {
    pub fn new(manifest_path: impl Into<PathBuf>, manifest_entry: ManifestEntry, unit: TransferUnit) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            manifest_entry,
            table_name: unit.table_name,
            partition_name: unit.partition_name,
            source_path: unit.source_path,
            destination_url: unit.destination_url,
            recorded_at: Utc::now(),
        }
    }

    /// The unit this record stands for
    pub fn unit(&self) -> TransferUnit {
        TransferUnit {
            table_name: self.table_name.clone(),
            partition_name: self.partition_name.clone(),
            source_path: self.source_path.clone(),
            destination_url: self.destination_url.clone(),
        }
    }

    /// Deterministic file name for this record's unit.
    ///
    /// Readable slugs of the identity fields are followed by a short hash of
    /// the full identity so slug collisions cannot merge distinct units.
    pub fn file_name(&self) -> String {
        let entry = &self.manifest_entry;
        let mut hasher = Sha256::new();
        for part in [
            entry.id.as_str(),
            entry.source_database_path.as_str(),
            self.table_name.as_str(),
            self.partition_name.as_str(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        let digest = hex::encode(hasher.finalize());

        format!(
            "{}__{}__{}__{}__{}.{}",
            slug(&entry.id),
            slug(&entry.source_database_path),
            slug(&self.table_name),
            slug(&self.partition_name),
            &digest[..16],
            RECORD_EXTENSION
        )
    }
}

fn slug(value: &str) -> String {
    let slug: String = value
        .trim_matches('/')
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .take(SLUG_MAX_LEN)
        .collect();
    if slug.is_empty() {
        "_".to_string()
    } else {
        slug
    }
}

/// Result of one drain pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Records replayed through the executor
    pub replayed: usize,
    /// Records whose replay succeeded and were deleted
    pub recovered: usize,
    /// Records left in place after a failed replay
    pub still_pending: usize,
    /// Records that could not be read or parsed
    pub unreadable: usize,
    /// Records whose replica failed verification
    pub integrity_failures: usize,
}

impl DrainReport {
    /// True when nothing is left for a later drain
    pub fn is_clean(&self) -> bool {
        self.still_pending == 0 && self.unreadable == 0 && self.integrity_failures == 0
    }
}

pub struct RecoveryQueue {
    dir: PathBuf,
    executor: Arc<TransferExecutor>,
}

impl RecoveryQueue {
    /// Open the queue over `dir`, creating the directory if needed and
    /// removing temporary files left by an interrupted enqueue
    pub fn open(dir: impl AsRef<Path>, executor: Arc<TransferExecutor>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| SyncError::from_io(&dir, e))?;
        let swept = sweep_temp_files(&dir)?;
        debug!(dir = %dir.display(), swept, "Opened recovery queue");
        Ok(Self { dir, executor })
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    /// Persist `record`, replacing any earlier record for the same unit
    pub fn enqueue(&self, record: &FailureRecord) -> Result<PathBuf> {
        let path = self.dir.join(record.file_name());
        let body = serde_json::to_vec_pretty(record)?;

        let mut temp = tempfile::Builder::new()
            .prefix(RECORD_TEMP_PREFIX)
            .tempfile_in(&self.dir)?;
        temp.write_all(&body)?;
        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| SyncError::Io(e.error))?;

        info!(
            record = %path.display(),
            id = %record.manifest_entry.id,
            table = %record.table_name,
            partition = %record.partition_name,
            "Recorded failed transfer"
        );
        Ok(path)
    }

    /// Paths of all persisted records, sorted by name
    pub fn pending(&self) -> Result<Vec<PathBuf>> {
        Self::list(&self.dir)
    }

    /// Record files in `dir` without opening a queue; a missing directory is empty
    pub fn list(dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SyncError::from_io(dir, e)),
        };

        let mut records = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == RECORD_EXTENSION) {
                records.push(path);
            }
        }
        records.sort();
        Ok(records)
    }

    /// Read one persisted record
    pub fn read(path: &Path) -> Result<FailureRecord> {
        let bytes = std::fs::read(path).map_err(|e| SyncError::from_io(path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| SyncError::parse(path, e.to_string()))
    }

    /// Replay every pending record, deleting each one that now succeeds.
    ///
    /// Failed replays, unreadable records and integrity failures all leave
    /// the record on disk and are counted in the report.
    pub async fn drain(&self) -> Result<DrainReport> {
        let records = self.pending()?;
        let mut report = DrainReport::default();

        if records.is_empty() {
            debug!(dir = %self.dir.display(), "No pending failure records");
            return Ok(report);
        }
        info!(dir = %self.dir.display(), pending = records.len(), "Draining failure records");

        for path in records {
            let record = match Self::read(&path) {
                Ok(record) => record,
                Err(SyncError::NotFound(_)) => {
                    debug!(record = %path.display(), "Record removed before replay");
                    continue;
                },
                Err(e) => {
                    warn!(record = %path.display(), error = %e, "Skipping unreadable failure record");
                    report.unreadable += 1;
                    continue;
                },
            };

            report.replayed += 1;
            info!(
                record = %path.display(),
                source = %record.source_path,
                destination = redact_url(&record.destination_url),
                "Replaying failed transfer"
            );

            match self.executor.run(&record.source_path, &record.destination_url).await {
                Ok(TransferOutcome::Success) => {
                    if self.remove_if_unchanged(&path, &record)? {
                        report.recovered += 1;
                        info!(record = %path.display(), "Recovered failed transfer");
                    } else {
                        report.still_pending += 1;
                    }
                },
                Ok(TransferOutcome::Failed(reason)) => {
                    report.still_pending += 1;
                    warn!(record = %path.display(), error = %reason, "Replay failed, record kept");
                },
                Err(e) => {
                    if e.is_integrity() {
                        report.integrity_failures += 1;
                    } else {
                        report.still_pending += 1;
                    }
                    error!(record = %path.display(), error = %e, "Replay aborted, record kept");
                },
            }
        }

        if report.is_clean() {
            info!(recovered = report.recovered, "Drain completed");
        } else {
            warn!(
                recovered = report.recovered,
                still_pending = report.still_pending,
                unreadable = report.unreadable,
                integrity_failures = report.integrity_failures,
                "Drain left records pending"
            );
        }
        Ok(report)
    }

    /// Delete `path` unless it was re-enqueued while its replay was running
    fn remove_if_unchanged(&self, path: &Path, replayed: &FailureRecord) -> Result<bool> {
        match Self::read(path) {
            Ok(current) if current.recorded_at != replayed.recorded_at => {
                debug!(record = %path.display(), "Record re-enqueued during replay, keeping");
                return Ok(false);
            },
            Err(SyncError::NotFound(_)) => return Ok(true),
            _ => {},
        }

        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(SyncError::from_io(path, e)),
        }
    }
}

/// Remove stale record temporaries from `dir`, returning how many were removed
fn sweep_temp_files(dir: &Path) -> Result<usize> {
    let mut swept = 0;
    for entry in std::fs::read_dir(dir).map_err(|e| SyncError::from_io(dir, e))? {
        let entry = entry?;
        if !entry.file_name().to_string_lossy().starts_with(RECORD_TEMP_PREFIX) {
            continue;
        }
        let path = entry.path();
        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok());
        if age.is_none_or(|age| age < ORPHAN_MIN_AGE) {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => {
                warn!(file = %path.display(), "Removed orphaned record temporary");
                swept += 1;
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => return Err(SyncError::from_io(&path, e)),
        }
    }
    Ok(swept)
}
