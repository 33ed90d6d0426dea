//! Partition enumeration
//!
//! A manifest entry's `path_db` is a directory whose immediate subdirectories
//! are tables, and each table's immediate subdirectories are partitions. Every
//! (table, partition) pair becomes one [`TransferUnit`]. Plain files at either
//! level are ignored.

use crate::config::DestinationConfig;
use crate::manifest::ManifestEntry;
use partsync_common::SyncError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// One concrete partition copy derived from a manifest entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferUnit {
    pub table_name: String,
    pub partition_name: String,
    pub source_path: String,
    pub destination_url: String,
}

/// Build `{base_url}/{container}/{folder}/{table}{auth_token}`.
///
/// Segments are joined verbatim with no escaping, and the token is appended
/// last. Empty segments are skipped so an empty folder does not produce `//`.
pub fn destination_url(destination: &DestinationConfig, entry: &ManifestEntry, table: &str) -> String {
    let mut url = destination.base_url.trim_end_matches('/').to_string();
    for segment in [entry.cloud_container.as_str(), entry.cloud_folder.as_str(), table] {
        let segment = segment.trim_matches('/');
        if !segment.is_empty() {
            url.push('/');
            url.push_str(segment);
        }
    }
    if let Some(token) = &destination.auth_token {
        url.push_str(token);
    }
    url
}

pub struct PartitionEnumerator {
    source_root: PathBuf,
    destination: DestinationConfig,
}

impl PartitionEnumerator {
    pub fn new(source_root: impl Into<PathBuf>, destination: DestinationConfig) -> Self {
        Self {
            source_root: source_root.into(),
            destination,
        }
    }

    /// Local directory an entry's `path_db` refers to
    pub fn database_dir(&self, entry: &ManifestEntry) -> PathBuf {
        self.source_root.join(&entry.source_database_path)
    }

    /// List every partition of `entry` in table then partition name order.
    ///
    /// An unreadable database directory yields no units; an unreadable table
    /// is skipped. Both are logged and never abort the rest of the manifest.
    pub fn enumerate(&self, entry: &ManifestEntry) -> Vec<TransferUnit> {
        let database = self.database_dir(entry);
        let tables = match subdirectories(&database) {
            Ok(tables) => tables,
            Err(e) => {
                error!(
                    id = %entry.id,
                    path = %database.display(),
                    error = %SyncError::from_io(&database, e),
                    "Source database unavailable, skipping entry"
                );
                return Vec::new();
            },
        };

        let mut units = Vec::new();
        for (table_name, table_path) in tables {
            let partitions = match subdirectories(&table_path) {
                Ok(partitions) => partitions,
                Err(e) => {
                    error!(
                        id = %entry.id,
                        table = %table_name,
                        error = %SyncError::from_io(&table_path, e),
                        "Table unreadable, skipping"
                    );
                    continue;
                },
            };

            let destination_url = destination_url(&self.destination, entry, &table_name);
            for (partition_name, partition_path) in partitions {
                debug!(id = %entry.id, table = %table_name, partition = %partition_name, "Found partition");
                units.push(TransferUnit {
                    table_name: table_name.clone(),
                    partition_name,
                    source_path: partition_path.to_string_lossy().into_owned(),
                    destination_url: destination_url.clone(),
                });
            }
        }

        info!(
            id = %entry.id,
            path = %database.display(),
            units = units.len(),
            "Enumerated partitions"
        );
        units
    }
}

fn subdirectories(path: &Path) -> std::io::Result<Vec<(String, PathBuf)>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push((entry.file_name().to_string_lossy().into_owned(), path));
        }
    }
    dirs.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(dirs)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn entry(path_db: &str) -> ManifestEntry {
        ManifestEntry {
            id: "1".into(),
            source_database_path: path_db.into(),
            cloud_container: "c1".into(),
            cloud_folder: "f1".into(),
        }
    }

    fn destination(token: Option<&str>) -> DestinationConfig {
        DestinationConfig {
            base_url: "https://acct.blob.core.windows.net".into(),
            auth_token: token.map(String::from),
        }
    }

    #[test]
    fn test_destination_url_appends_token_last() {
        let url = destination_url(&destination(Some("?sv=2022&sig=a%2Fb")), &entry("dbA"), "tableX");
        assert_eq!(url, "https://acct.blob.core.windows.net/c1/f1/tableX?sv=2022&sig=a%2Fb");
    }

    #[test]
    fn test_destination_url_skips_empty_folder() {
        let mut e = entry("dbA");
        e.cloud_folder = String::new();
        let mut dest = destination(None);
        dest.base_url.push('/');
        assert_eq!(destination_url(&dest, &e, "t"), "https://acct.blob.core.windows.net/c1/t");
    }

    #[test]
    fn test_enumerate_tables_and_partitions() {
        let root = TempDir::new().unwrap();
        for dir in ["dbA/tableY/p1", "dbA/tableX/p2", "dbA/tableX/p1"] {
            fs::create_dir_all(root.path().join(dir)).unwrap();
        }
        fs::write(root.path().join("dbA/README"), b"not a table").unwrap();
        fs::write(root.path().join("dbA/tableX/_SUCCESS"), b"").unwrap();

        let enumerator = PartitionEnumerator::new(root.path(), destination(Some("?tok")));
        let units = enumerator.enumerate(&entry("dbA"));

        let pairs: Vec<(&str, &str)> = units
            .iter()
            .map(|u| (u.table_name.as_str(), u.partition_name.as_str()))
            .collect();
        assert_eq!(pairs, vec![("tableX", "p1"), ("tableX", "p2"), ("tableY", "p1")]);

        assert_eq!(
            units[0].source_path,
            root.path().join("dbA/tableX/p1").to_string_lossy()
        );
        assert_eq!(units[0].destination_url, "https://acct.blob.core.windows.net/c1/f1/tableX?tok");
    }

    #[test]
    fn test_missing_database_yields_no_units() {
        let root = TempDir::new().unwrap();
        let enumerator = PartitionEnumerator::new(root.path(), destination(None));
        assert!(enumerator.enumerate(&entry("missing")).is_empty());
    }

    #[test]
    fn test_absolute_path_db_ignores_root() {
        let data = TempDir::new().unwrap();
        fs::create_dir_all(data.path().join("db/t/p")).unwrap();

        let enumerator = PartitionEnumerator::new("/unrelated", destination(None));
        let units = enumerator.enumerate(&entry(data.path().join("db").to_str().unwrap()));
        assert_eq!(units.len(), 1);
    }
}
