//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::extract::DocumentKind;

/// A source document selected for ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Location on disk
    pub path: PathBuf,

    /// File name, used as the provenance tag of its fragments
    pub name: String,

    /// Type tag derived from the extension
    pub kind: DocumentKind,
}

impl Document {
    /// Describe the file at `path`.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        let kind = DocumentKind::from_path(&path);

        Self { path, name, kind }
    }
}

/// A bounded slice of one page of extracted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    /// Identifier unique within one build (`chunk-<n>`)
    pub id: String,

    /// Insertion order within the build
    pub seq: u64,

    /// Name of the originating document
    pub source: String,

    /// Page of the originating document (0 for non-paginated types)
    pub page: u32,

    /// Fragment text
    pub text: String,
}

impl Fragment {
    /// Format the identifier for the `seq`-th fragment of a build.
    pub fn id_for(seq: u64) -> String {
        format!("chunk-{}", seq)
    }
}

/// A fragment paired with its embedding, ready to be indexed.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    pub fragment: Fragment,
    pub vector: Vec<f32>,
}

/// A stored fragment returned by a similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredFragment {
    pub text: String,
    pub source: String,

    /// Cosine distance to the query (0.0 is identical direction)
    pub distance: f32,
}

/// Outcome status of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Ok,
    Error,
}

/// Structured result of a knowledge base build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    pub status: BuildStatus,

    /// Number of documents read
    pub num_documents: usize,

    /// Number of fragments indexed
    pub num_chunks: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BuildReport {
    pub fn ok(num_documents: usize, num_chunks: usize) -> Self {
        Self {
            status: BuildStatus::Ok,
            num_documents,
            num_chunks,
            message: None,
        }
    }

    pub fn error(num_documents: usize, message: impl Into<String>) -> Self {
        Self {
            status: BuildStatus::Error,
            num_documents,
            num_chunks: 0,
            message: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == BuildStatus::Ok
    }
}

/// Provenance attached to a retrieved context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMetadata {
    pub source: String,
}

/// One retrieved fragment, best matches first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub text: String,
    pub metadata: ContextMetadata,
}

impl From<ScoredFragment> for RetrievedContext {
    fn from(fragment: ScoredFragment) -> Self {
        Self {
            text: fragment.text,
            metadata: ContextMetadata {
                source: fragment.source,
            },
        }
    }
}

/// Retrieval response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrieveResponse {
    pub contexts: Vec<RetrievedContext>,
}

/// Summary of the current index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    /// Fragments currently stored
    pub num_chunks: usize,

    /// Documents in the last successful build
    pub num_documents: usize,

    /// When the last successful build finished
    pub built_at: Option<DateTime<Utc>>,

    /// Embedding identity of the stored vectors, e.g. "trigram/trigram-v1 (384d)"
    pub embedding: Option<String>,

    /// Index directory size on disk
    pub index_size_bytes: u64,
}
