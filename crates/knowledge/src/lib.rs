//! Knowledge base: document ingestion and similarity retrieval.
//!
//! Documents are extracted into page texts, split into fixed-size fragments,
//! embedded, and stored in a local LanceDB index. Queries return the nearest
//! fragments by cosine distance.

pub mod builder;
pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod extract;
pub mod lancedb_index;
pub mod manifest;
pub mod progress;
pub mod retriever;
pub mod types;
pub mod vector_index;

// Re-export commonly used types
pub use builder::{BuildPaths, KnowledgeBaseBuilder};
pub use chunker::ChunkPolicy;
pub use config::KnowledgeBaseConfig;
pub use embeddings::{Embedder, EmbeddingConfig, EmbeddingIdentity, EmbeddingProvider};
pub use extract::{DocumentKind, ExtractionError, Extractor};
pub use lancedb_index::LanceDbIndex;
pub use manifest::{IndexManifest, SourceRecord};
pub use progress::{BuildPhase, ProgressEvent, ProgressReporter};
pub use types::{
    BuildReport, BuildStatus, ContextMetadata, Document, Fragment, IndexRecord, IndexStats,
    RetrieveResponse, RetrievedContext, ScoredFragment,
};
pub use vector_index::VectorIndex;

use qakb_core::{AppConfig, AppResult};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use walkdir::WalkDir;

/// Session handle over one workspace's knowledge base.
///
/// Builds and cleans take the index write lock, so they are serialized and
/// never observed half-done; retrievals and stats share the read lock.
pub struct KnowledgeBase {
    workspace: PathBuf,
    config: KnowledgeBaseConfig,
    index_dir: PathBuf,
    embedder: Embedder,
    index: RwLock<Box<dyn VectorIndex>>,
}

impl KnowledgeBase {
    /// Open the knowledge base of the configured workspace.
    ///
    /// Loads the `knowledge:` config section, creates the embedder, and opens
    /// the on-disk index. Nothing is rebuilt implicitly.
    pub async fn open(app: &AppConfig) -> AppResult<Self> {
        let config = KnowledgeBaseConfig::load(app)?;
        let embedder = Embedder::from_config(&config.embedding).await?;
        let index_dir = config.index_path(&app.workspace);
        let index = LanceDbIndex::open(&index_dir, embedder.dimensions()).await?;

        tracing::debug!("Opened knowledge base at {:?}", index_dir);

        Ok(Self::with_components(
            app.workspace.clone(),
            config,
            embedder,
            Box::new(index),
        ))
    }

    /// Assemble a knowledge base from explicit parts.
    pub fn with_components(
        workspace: PathBuf,
        config: KnowledgeBaseConfig,
        embedder: Embedder,
        index: Box<dyn VectorIndex>,
    ) -> Self {
        let index_dir = config.index_path(&workspace);
        Self {
            workspace,
            config,
            index_dir,
            embedder,
            index: RwLock::new(index),
        }
    }

    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    /// Rebuild the index from the corpus directory and reference document.
    pub async fn build(&self) -> AppResult<BuildReport> {
        self.build_with_progress(ProgressReporter::noop()).await
    }

    pub async fn build_with_progress(&self, progress: ProgressReporter) -> AppResult<BuildReport> {
        let paths = BuildPaths {
            support_docs_dir: self.config.support_docs_path(&self.workspace),
            reference_document: self.config.reference_document_path(&self.workspace),
            index_dir: self.index_dir.clone(),
        };

        tracing::info!(
            "Building knowledge base from {:?} (reference: {:?})",
            paths.support_docs_dir,
            paths.reference_document
        );

        let builder = KnowledgeBaseBuilder::new(
            Extractor::new(self.config.max_page_chars),
            self.config.chunk_policy()?,
        )
        .with_progress(progress);

        let mut index = self.index.write().await;
        builder.build(&paths, &self.embedder, &mut **index).await
    }

    /// Return up to `top_k` fragments for `query` (config default when `None`).
    pub async fn retrieve(&self, query: &str, top_k: Option<usize>) -> AppResult<RetrieveResponse> {
        let k = top_k.unwrap_or(self.config.top_k);
        tracing::info!("Retrieving top-{} fragments for query: {}", k, query);

        let index = self.index.read().await;
        let manifest = IndexManifest::load(&self.index_dir)?;
        let contexts =
            retriever::retrieve(&self.embedder, &**index, manifest.as_ref(), query, k)
                .await?;

        Ok(RetrieveResponse { contexts })
    }

    /// Summarize the current snapshot.
    pub async fn stats(&self) -> AppResult<IndexStats> {
        let index = self.index.read().await;
        let num_chunks = index.count().await?;
        let manifest = IndexManifest::load(&self.index_dir)?;

        Ok(IndexStats {
            num_chunks,
            num_documents: manifest.as_ref().map_or(0, |m| m.num_documents),
            built_at: manifest.as_ref().map(|m| m.built_at),
            embedding: manifest.as_ref().map(|m| m.embedding.to_string()),
            index_size_bytes: dir_size(&self.index_dir),
        })
    }

    /// Empty the index and forget the last build.
    pub async fn clean(&self) -> AppResult<()> {
        tracing::info!("Cleaning knowledge base at {:?}", self.index_dir);

        let mut index = self.index.write().await;
        index.clear().await?;
        IndexManifest::remove(&self.index_dir)?;

        tracing::info!("Knowledge base cleaned");
        Ok(())
    }
}

/// Total size of the files under `dir` (0 when absent).
fn dir_size(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}
