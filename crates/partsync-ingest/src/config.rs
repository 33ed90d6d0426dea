//! Configuration for the replication engine
//!
//! Settings come from an optional TOML file, then `PARTSYNC_*` environment
//! variables, then command-line flags applied by the caller. Every field has a
//! default except the destination base URL, which [`SyncConfig::validate`]
//! requires before any transfer runs.

use partsync_common::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_INTERVAL_SECS: u64 = 2;
pub const DEFAULT_RETRIES: u32 = 5;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 30;
pub const DEFAULT_MIN_AVAILABLE_MEMORY_MB: u64 = 500;
pub const DEFAULT_PROCESSED_LOG: &str = "processed_files.txt";
pub const DEFAULT_RECOVERY_DIR: &str = "failed_transfers";
pub const DEFAULT_TOOL_PATH: &str = "azcopy";

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Relative `path_db` values in manifests resolve against this directory
    pub source_root: PathBuf,
    pub watch: WatchConfig,
    pub transfer: TransferConfig,
    pub destination: DestinationConfig,
    /// Service-principal login, run before every copy attempt when present
    pub credentials: Option<Credentials>,
    pub recovery: RecoveryConfig,
    pub resources: ResourceConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from("."),
            watch: WatchConfig::default(),
            transfer: TransferConfig::default(),
            destination: DestinationConfig::default(),
            credentials: None,
            recovery: RecoveryConfig::default(),
            resources: ResourceConfig::default(),
        }
    }
}

/// Directory polling settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WatchConfig {
    pub directory: PathBuf,
    pub interval_secs: u64,
    /// Append-only log of manifests already dispatched
    pub processed_log: PathBuf,
    /// Only files with this extension are treated as manifests; `None` accepts all
    pub extension: Option<String>,
    /// Start from an empty snapshot so files present at startup are considered
    pub process_existing_on_start: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            interval_secs: DEFAULT_INTERVAL_SECS,
            processed_log: PathBuf::from(DEFAULT_PROCESSED_LOG),
            extension: Some("json".to_string()),
            process_existing_on_start: false,
        }
    }
}

impl WatchConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Copy tool invocation and retry settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransferConfig {
    pub tool_path: PathBuf,
    /// Total attempts per transfer, including the first
    pub retries: u32,
    pub retry_delay_secs: u64,
    /// Pass `--put-md5` so the store records a content hash
    pub put_md5: bool,
    /// Download and hash every replica after a successful copy
    pub verify_integrity: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            tool_path: PathBuf::from(DEFAULT_TOOL_PATH),
            retries: DEFAULT_RETRIES,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            put_md5: false,
            verify_integrity: false,
        }
    }
}

impl TransferConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// Remote store location
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DestinationConfig {
    /// Account endpoint, e.g. `https://account.blob.core.windows.net`
    pub base_url: String,
    /// Appended verbatim after the path segments, e.g. a SAS query string
    pub auth_token: Option<String>,
}

/// Service-principal certificate login
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credentials {
    pub certificate_path: PathBuf,
    pub application_id: String,
    pub tenant_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecoveryConfig {
    pub directory: PathBuf,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_RECOVERY_DIR),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResourceConfig {
    /// Ticks are skipped while available memory is below this many MiB
    pub min_available_memory_mb: u64,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            min_available_memory_mb: DEFAULT_MIN_AVAILABLE_MEMORY_MB,
        }
    }
}

impl SyncConfig {
    /// Load from an optional TOML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SyncError::from_io(path, e))?;
        toml::from_str(&content).map_err(|e| SyncError::parse(path, e.to_string()))
    }

    /// Apply `PARTSYNC_*` overrides read through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PARTSYNC_SOURCE_ROOT") {
            self.source_root = PathBuf::from(v);
        }
        if let Some(v) = lookup("PARTSYNC_WATCH_DIR") {
            self.watch.directory = PathBuf::from(v);
        }
        if let Some(v) = parsed(&lookup, "PARTSYNC_WATCH_INTERVAL_SECS")? {
            self.watch.interval_secs = v;
        }
        if let Some(v) = lookup("PARTSYNC_PROCESSED_LOG") {
            self.watch.processed_log = PathBuf::from(v);
        }
        if let Some(v) = lookup("PARTSYNC_WATCH_EXTENSION") {
            self.watch.extension = if v.is_empty() { None } else { Some(v) };
        }
        if let Some(v) = lookup("PARTSYNC_TOOL_PATH") {
            self.transfer.tool_path = PathBuf::from(v);
        }
        if let Some(v) = parsed(&lookup, "PARTSYNC_RETRIES")? {
            self.transfer.retries = v;
        }
        if let Some(v) = parsed(&lookup, "PARTSYNC_RETRY_DELAY_SECS")? {
            self.transfer.retry_delay_secs = v;
        }
        if let Some(v) = parsed(&lookup, "PARTSYNC_PUT_MD5")? {
            self.transfer.put_md5 = v;
        }
        if let Some(v) = parsed(&lookup, "PARTSYNC_VERIFY_INTEGRITY")? {
            self.transfer.verify_integrity = v;
        }
        if let Some(v) = lookup("PARTSYNC_BASE_URL") {
            self.destination.base_url = v;
        }
        if let Some(v) = lookup("PARTSYNC_AUTH_TOKEN") {
            self.destination.auth_token = Some(v);
        }
        if let Some(v) = lookup("PARTSYNC_RECOVERY_DIR") {
            self.recovery.directory = PathBuf::from(v);
        }
        if let Some(v) = parsed(&lookup, "PARTSYNC_MIN_MEMORY_MB")? {
            self.resources.min_available_memory_mb = v;
        }

        let cert = lookup("PARTSYNC_CERT_PATH");
        let app = lookup("PARTSYNC_APPLICATION_ID");
        let tenant = lookup("PARTSYNC_TENANT_ID");
        match (cert, app, tenant) {
            (Some(certificate_path), Some(application_id), Some(tenant_id)) => {
                self.credentials = Some(Credentials {
                    certificate_path: PathBuf::from(certificate_path),
                    application_id,
                    tenant_id,
                });
            },
            (None, None, None) => {},
            _ => {
                return Err(SyncError::config(
                    "PARTSYNC_CERT_PATH, PARTSYNC_APPLICATION_ID and PARTSYNC_TENANT_ID must be set together",
                ));
            },
        }

        Ok(())
    }

    /// Check the settings required before any transfer can run
    pub fn validate(&self) -> Result<()> {
        if self.destination.base_url.trim().is_empty() {
            return Err(SyncError::config(
                "destination.base_url is required (or set PARTSYNC_BASE_URL)",
            ));
        }
        if self.watch.interval_secs == 0 {
            return Err(SyncError::config("watch.interval_secs must be greater than 0"));
        }
        if self.transfer.retries == 0 {
            return Err(SyncError::config("transfer.retries must be greater than 0"));
        }
        Ok(())
    }
}

fn parsed<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| SyncError::config(format!("Invalid value for {}: {} ({})", key, raw, e))),
        None => Ok(None),
    }
}
