//! Index manifest: a JSON sidecar describing the current snapshot.
//!
//! Written after every successful build. It records which embedding function
//! produced the stored vectors so a later query with a different one fails
//! instead of returning meaningless neighbours.

use crate::config::get_manifest_path;
use crate::embeddings::EmbeddingIdentity;
use chrono::{DateTime, Utc};
use qakb_core::AppResult;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Distance metric every query uses.
pub const DISTANCE_METRIC: &str = "cosine";

/// Description of one index snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub embedding: EmbeddingIdentity,
    pub distance: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub built_at: DateTime<Utc>,
    pub num_documents: usize,
    pub num_chunks: usize,
    pub sources: Vec<SourceRecord>,
}

/// One ingested document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub name: String,
    pub kind: String,
    pub bytes: u64,

    /// Hex SHA-256 of the file content
    pub sha256: String,

    /// Fragments contributed to the snapshot
    pub chunks: usize,

    /// Extraction failure, if the document contributed nothing because of one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IndexManifest {
    /// Load the manifest from an index directory, if one was written.
    pub fn load(index_dir: &Path) -> AppResult<Option<Self>> {
        let path = get_manifest_path(index_dir);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)?;
        let manifest = serde_json::from_str(&content)?;
        Ok(Some(manifest))
    }

    /// Write the manifest into an index directory.
    pub fn save(&self, index_dir: &Path) -> AppResult<()> {
        std::fs::create_dir_all(index_dir)?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(get_manifest_path(index_dir), content)?;

        tracing::debug!("Saved index manifest to {:?}", index_dir);
        Ok(())
    }

    /// Delete the manifest, if present.
    pub fn remove(index_dir: &Path) -> AppResult<()> {
        let path = get_manifest_path(index_dir);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// Hex-encoded SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
