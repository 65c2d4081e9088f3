//! Cache entry metadata
//!
//! Every downloaded file gets a `<file>.meta.json` sidecar recording where it
//! came from. The sidecar is informational; entry existence alone decides
//! whether the cache is consulted.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during metadata operations
#[derive(Debug, Error)]
pub enum EntryError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Metadata for a cached file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    /// URL the file was fetched from
    pub url: String,

    /// SHA-256 checksum (hex-encoded)
    pub sha256: String,

    /// Size in bytes
    pub size: u64,

    /// Timestamp of the download (Unix timestamp)
    pub fetched_at: u64,
}

impl CacheEntry {
    /// Describe freshly downloaded content
    pub fn new(url: &str, content: &[u8]) -> Self {
        Self {
            url: url.to_string(),
            sha256: compute_checksum(content),
            size: content.len() as u64,
            fetched_at: Self::current_timestamp(),
        }
    }

    /// Sidecar path for a cached file
    pub fn sidecar_path(file: &Path) -> PathBuf {
        let mut name = file.file_name().unwrap_or_default().to_os_string();
        name.push(".meta.json");
        file.with_file_name(name)
    }

    /// Load metadata from a JSON file
    pub fn load(path: &Path) -> Result<Self, EntryError> {
        let contents = fs::read_to_string(path)?;
        let entry = serde_json::from_str(&contents)?;
        Ok(entry)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<Vec<u8>, EntryError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    fn current_timestamp() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Compute SHA-256 checksum of bytes
pub fn compute_checksum(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
