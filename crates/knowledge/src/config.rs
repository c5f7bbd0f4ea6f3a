//! Knowledge base configuration management.
//!
//! Settings come from the `knowledge:` section of `.qakb/config.yaml`. Every
//! field has a default, so an absent section yields a working setup.

use crate::chunker::ChunkPolicy;
use crate::embeddings::EmbeddingConfig;
use qakb_core::{AppConfig, AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBaseConfig {
    /// Directory of documents ingested on every build
    #[serde(default = "default_support_docs_dir")]
    pub support_docs_dir: PathBuf,

    /// Distinguished document ingested alongside the corpus when present
    #[serde(default = "default_reference_document")]
    pub reference_document: PathBuf,

    /// Index location; defaults to `.qakb/index`
    #[serde(default)]
    pub index_dir: Option<PathBuf>,

    /// Fragment size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared between consecutive fragments
    #[serde(default)]
    pub chunk_overlap: usize,

    /// Pages longer than this are skipped instead of chunked
    #[serde(default = "default_max_page_chars")]
    pub max_page_chars: usize,

    /// Default number of fragments returned by a retrieval
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

fn default_support_docs_dir() -> PathBuf {
    PathBuf::from("support_docs")
}

fn default_reference_document() -> PathBuf {
    PathBuf::from("checkout.html")
}

fn default_chunk_size() -> usize {
    800
}

fn default_max_page_chars() -> usize {
    500_000
}

fn default_top_k() -> usize {
    5
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            support_docs_dir: default_support_docs_dir(),
            reference_document: default_reference_document(),
            index_dir: None,
            chunk_size: default_chunk_size(),
            chunk_overlap: 0,
            max_page_chars: default_max_page_chars(),
            top_k: default_top_k(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl KnowledgeBaseConfig {
    /// Load the knowledge section of the application config and validate it.
    pub fn load(app: &AppConfig) -> AppResult<Self> {
        let config: Self = app.section("knowledge")?;
        config.validate()?;

        tracing::debug!(
            "Loaded knowledge config: chunk_size={}, overlap={}, provider={}",
            config.chunk_size,
            config.chunk_overlap,
            config.embedding.provider
        );

        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        self.chunk_policy()?;

        if self.max_page_chars == 0 {
            return Err(AppError::Config(
                "max_page_chars must be greater than zero".to_string(),
            ));
        }

        self.embedding.validate()
    }

    /// The chunking policy described by this config.
    pub fn chunk_policy(&self) -> AppResult<ChunkPolicy> {
        ChunkPolicy::new(self.chunk_size, self.chunk_overlap)
    }

    /// Corpus directory resolved against the workspace.
    pub fn support_docs_path(&self, workspace: &Path) -> PathBuf {
        workspace.join(&self.support_docs_dir)
    }

    /// Reference document resolved against the workspace.
    pub fn reference_document_path(&self, workspace: &Path) -> PathBuf {
        workspace.join(&self.reference_document)
    }

    /// Index directory resolved against the workspace.
    pub fn index_path(&self, workspace: &Path) -> PathBuf {
        match &self.index_dir {
            Some(dir) => workspace.join(dir),
            None => get_index_dir(workspace),
        }
    }
}

/// Default index directory for a workspace.
pub fn get_index_dir(workspace: &Path) -> PathBuf {
    workspace.join(qakb_core::config::STATE_DIR).join("index")
}

/// Manifest path inside an index directory.
pub fn get_manifest_path(index_dir: &Path) -> PathBuf {
    index_dir.join("manifest.json")
}
