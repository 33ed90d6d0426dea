//! Persistent set of dispatched manifest files
//!
//! The log is newline-delimited, read fully at startup and appended to after
//! every successful dispatch. The watch loop never rewrites it; [`ProcessedLog::compact`]
//! is an explicit operator action.

use partsync_common::{Result, SyncError};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Outcome of a log compaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactReport {
    /// Lines in the log before compaction
    pub before: usize,
    /// Distinct paths kept
    pub kept: usize,
    pub duplicates_removed: usize,
    pub missing_removed: usize,
}

#[derive(Debug)]
pub struct ProcessedLog {
    path: PathBuf,
    entries: HashSet<String>,
}

impl ProcessedLog {
    /// Load the log at `path`, creating an empty one if it does not exist
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| SyncError::from_io(parent, e))?;
        }

        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) => parse_lines(&contents).map(String::from).collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                std::fs::File::create(&path).map_err(|e| SyncError::from_io(&path, e))?;
                HashSet::new()
            },
            Err(e) => return Err(SyncError::from_io(&path, e)),
        };

        debug!(log = %path.display(), entries = entries.len(), "Loaded processed-files log");
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, file: &Path) -> bool {
        self.entries.contains(file.to_string_lossy().as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Durably append `file` and add it to the in-memory set.
    ///
    /// A path containing a line break is rejected and nothing is written.
    pub fn record(&mut self, file: &Path) -> Result<()> {
        let line = file.to_string_lossy().into_owned();
        if line.contains(['\n', '\r']) {
            return Err(SyncError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("path contains a line break: {:?}", line),
            )));
        }
        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SyncError::from_io(&self.path, e))?;
        writeln!(log, "{}", line)?;
        log.flush()?;
        log.sync_data()?;

        debug!(log = %self.path.display(), file = %line, "Marked file processed");
        self.entries.insert(line);
        Ok(())
    }

    /// Rewrite the log without duplicate lines or paths that no longer exist.
    ///
    /// First-seen order is kept. The new log replaces the old one atomically.
    pub fn compact(&mut self) -> Result<CompactReport> {
        let contents = std::fs::read_to_string(&self.path).map_err(|e| SyncError::from_io(&self.path, e))?;
        let mut report = CompactReport::default();
        let mut seen = HashSet::new();
        let mut kept = Vec::new();

        for line in parse_lines(&contents) {
            report.before += 1;
            if !seen.insert(line) {
                report.duplicates_removed += 1;
            } else if !Path::new(line).exists() {
                report.missing_removed += 1;
            } else {
                kept.push(line);
            }
        }
        report.kept = kept.len();

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
        for line in &kept {
            writeln!(temp, "{}", line)?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| SyncError::Io(e.error))?;

        self.entries = kept.into_iter().map(String::from).collect();
        info!(
            log = %self.path.display(),
            kept = report.kept,
            duplicates_removed = report.duplicates_removed,
            missing_removed = report.missing_removed,
            "Compacted processed-files log"
        );
        Ok(report)
    }
}

fn parse_lines(contents: &str) -> impl Iterator<Item = &str> {
    contents.lines().map(str::trim_end).filter(|line| !line.is_empty())
}
