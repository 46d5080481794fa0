//! Artifact Record - content-addressed file attached to a run

use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Hash prefix for [`ArtifactRecord::cas_hash`].
pub const CAS_ALGORITHM: &str = "trueno";

/// Content hash in `algorithm:hex_digest` form.
#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{CAS_ALGORITHM}:{:016x}", trueno::hash_bytes(bytes))
}

/// A file attached to a run, identified by the hash of its content.
///
/// `uri` is where the file lived when logged; the store does not copy it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactRecord {
    run_id: String,
    key: String,
    uri: String,
    cas_hash: String,
    size_bytes: u64,
    created_at: DateTime<Utc>,
}

impl ArtifactRecord {
    /// Describe in-memory content that lives at `uri`. The key is the
    /// final path component of `uri`.
    #[must_use]
    pub fn from_bytes(run_id: impl Into<String>, uri: &Path, bytes: &[u8]) -> Self {
        let key = uri
            .file_name()
            .map_or_else(|| uri.display().to_string(), |n| n.to_string_lossy().into_owned());
        Self {
            run_id: run_id.into(),
            key,
            uri: uri.display().to_string(),
            cas_hash: content_hash(bytes),
            size_bytes: bytes.len() as u64,
            created_at: Utc::now(),
        }
    }

    /// Read and hash the file at `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Io`] if the file cannot be read
    pub fn from_file(run_id: impl Into<String>, path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self::from_bytes(run_id, path, &bytes))
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the artifact name (e.g. `metrics.json`).
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the location the artifact was logged from.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Get the content-addressable hash.
    #[must_use]
    pub fn cas_hash(&self) -> &str {
        &self.cas_hash
    }

    /// Get the artifact size in bytes.
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Get the logging timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
