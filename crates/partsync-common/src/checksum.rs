//! Checksum utilities for replica verification
//!
//! Content is hashed with SHA-256, streamed in 8 KiB chunks. Directory trees
//! hash to a digest over every contained file's relative path and content
//! digest, visited in sorted order, so two trees with the same layout and
//! bytes produce the same value regardless of where they live on disk.

use crate::error::{Result, SyncError};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use walkdir::WalkDir;

const CHUNK_SIZE: usize = 8192;

/// Compute the SHA-256 checksum of any readable source
pub fn compute_checksum<R: Read>(reader: &mut R) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; CHUNK_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Compute the SHA-256 checksum of a single file
pub fn compute_file_checksum(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let mut file = std::fs::File::open(path).map_err(|e| SyncError::from_io(path, e))?;
    compute_checksum(&mut file)
}

/// Compute a checksum for a file or a whole directory tree
pub fn compute_tree_checksum(path: impl AsRef<Path>) -> Result<String> {
    let root = path.as_ref();
    let metadata = std::fs::metadata(root).map_err(|e| SyncError::from_io(root, e))?;
    if metadata.is_file() {
        return compute_file_checksum(root);
    }

    let mut hasher = Sha256::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| SyncError::Io(std::io::Error::other(e)))?;
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let digest = compute_file_checksum(entry.path())?;
        hasher.update(relative.as_bytes());
        hasher.update(b":");
        hasher.update(digest.as_bytes());
        hasher.update(b"\n");
    }

    Ok(hex::encode(hasher.finalize()))
}
