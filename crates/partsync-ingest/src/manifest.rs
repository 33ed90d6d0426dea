//! Ingestion manifest loading
//!
//! A manifest is a JSON array of ingestion requests. Each request names a
//! local database directory and the container/folder it replicates into:
//!
//! ```json
//! [
//!   {
//!     "id": "1",
//!     "cloud_location_container": "raw",
//!     "cloud_destination_folder_name": "sales",
//!     "path_db": "warehouse/sales_db"
//!   }
//! ]
//! ```

use partsync_common::{Result, SyncError};
use serde::{Deserialize, Deserializer, Serialize};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// One logical ingestion request from a manifest
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Ingestion identifier; numeric ids in the manifest are kept as text
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,

    #[serde(rename = "path_db")]
    pub source_database_path: String,

    #[serde(rename = "cloud_location_container")]
    pub cloud_container: String,

    #[serde(rename = "cloud_destination_folder_name")]
    pub cloud_folder: String,
}

/// Load and validate every entry of the manifest at `path`.
///
/// Existence and read access are checked before the content is parsed, so a
/// missing file is `NotFound`, an unreadable one is `PermissionDenied`, and
/// only malformed content is reported as `Parse`.
pub fn load(path: &Path) -> Result<Vec<ManifestEntry>> {
    let metadata = std::fs::metadata(path).map_err(|e| SyncError::from_io(path, e))?;
    if !metadata.is_file() {
        return Err(SyncError::NotFound(format!("{} is not a regular file", path.display())));
    }

    let mut file = std::fs::File::open(path).map_err(|e| SyncError::from_io(path, e))?;
    let mut bytes = Vec::with_capacity(metadata.len() as usize);
    file.read_to_end(&mut bytes)
        .map_err(|e| SyncError::from_io(path, e))?;

    let entries: Vec<ManifestEntry> =
        serde_json::from_slice(&bytes).map_err(|e| SyncError::parse(path, e.to_string()))?;

    for (index, entry) in entries.iter().enumerate() {
        validate_entry(entry).map_err(|msg| SyncError::parse(path, format!("entry {}: {}", index, msg)))?;
        debug!(
            manifest = %path.display(),
            id = %entry.id,
            source = %entry.source_database_path,
            container = %entry.cloud_container,
            folder = %entry.cloud_folder,
            "Manifest entry"
        );
    }

    info!(manifest = %path.display(), entries = entries.len(), "Loaded ingestion manifest");
    Ok(entries)
}

fn validate_entry(entry: &ManifestEntry) -> std::result::Result<(), &'static str> {
    if entry.id.trim().is_empty() {
        return Err("id cannot be empty");
    }
    if entry.source_database_path.trim().is_empty() {
        return Err("path_db cannot be empty");
    }
    if entry.cloud_container.trim().is_empty() {
        return Err("cloud_location_container cannot be empty");
    }
    Ok(())
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_manifest() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "batch.json",
            r#"[
                {"id": "1", "cloud_location_container": "c1", "cloud_destination_folder_name": "f1", "path_db": "dbA"},
                {"id": 2, "cloud_location_container": "c2", "cloud_destination_folder_name": "f2", "path_db": "/abs/dbB"}
            ]"#,
        );

        let entries = load(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0],
            ManifestEntry {
                id: "1".into(),
                source_database_path: "dbA".into(),
                cloud_container: "c1".into(),
                cloud_folder: "f1".into(),
            }
        );
        assert_eq!(entries[1].id, "2");
    }

    #[test]
    fn test_missing_manifest_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[test]
    fn test_directory_is_not_a_manifest() {
        let dir = TempDir::new().unwrap();
        let err = load(dir.path()).unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[test]
    fn test_malformed_manifest_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "bad.json", "{ not json");
        assert!(matches!(load(&path).unwrap_err(), SyncError::Parse { .. }));

        let path = write(&dir, "missing.json", r#"[{"id": "1", "path_db": "x"}]"#);
        assert!(matches!(load(&path).unwrap_err(), SyncError::Parse { .. }));
    }

    #[test]
    fn test_empty_fields_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "empty.json",
            r#"[{"id": "", "cloud_location_container": "c", "cloud_destination_folder_name": "f", "path_db": "d"}]"#,
        );
        let err = load(&path).unwrap_err();
        assert!(matches!(err, SyncError::Parse { message, .. } if message.contains("id")));
    }

    #[test]
    fn test_empty_manifest_is_valid() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "none.json", "[]");
        assert!(load(&path).unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_manifest_is_permission_denied() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = write(&dir, "locked.json", "[]");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users bypass mode bits; nothing to assert then.
        if fs::File::open(&path).is_ok() {
            return;
        }
        assert!(matches!(load(&path).unwrap_err(), SyncError::PermissionDenied(_)));
    }
}
