//! Full rebuild of the knowledge base from a document directory.
//!
//! Pipeline: discover -> extract -> chunk -> embed -> index. Everything that
//! can fail without touching the store (discovery, extraction, embedding)
//! runs before the single `replace_all` call.

use crate::chunker::ChunkPolicy;
use crate::embeddings::Embedder;
use crate::extract::{ExtractionError, Extractor};
use crate::manifest::{content_hash, IndexManifest, SourceRecord, DISTANCE_METRIC};
use crate::progress::ProgressReporter;
use crate::types::{BuildReport, Document, Fragment, IndexRecord};
use crate::vector_index::VectorIndex;
use chrono::Utc;
use qakb_core::{AppError, AppResult};
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

pub const NO_DOCUMENTS_MESSAGE: &str = "No documents found to ingest.";
pub const NO_TEXT_MESSAGE: &str = "No text could be extracted from the documents.";

/// Where a build reads from and writes to.
#[derive(Debug, Clone)]
pub struct BuildPaths {
    pub support_docs_dir: PathBuf,
    pub reference_document: PathBuf,
    pub index_dir: PathBuf,
}

/// Orchestrates a full rebuild.
#[derive(Debug, Clone)]
pub struct KnowledgeBaseBuilder {
    extractor: Extractor,
    policy: ChunkPolicy,
    progress: ProgressReporter,
}

/// Result of reading and extracting one document.
struct Extracted {
    bytes: u64,
    sha256: String,
    pages: Result<Vec<String>, ExtractionError>,
}

impl KnowledgeBaseBuilder {
    pub fn new(extractor: Extractor, policy: ChunkPolicy) -> Self {
        Self {
            extractor,
            policy,
            progress: ProgressReporter::noop(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Rebuild `index` from the documents under `paths`.
    ///
    /// Missing input and documents without text produce an error report and
    /// leave the index untouched. Embedding and index failures are returned
    /// as errors.
    pub async fn build(
        &self,
        paths: &BuildPaths,
        embedder: &Embedder,
        index: &mut dyn VectorIndex,
    ) -> AppResult<BuildReport> {
        let start = Instant::now();

        let documents = collect_documents(&paths.support_docs_dir, &paths.reference_document)?;
        self.progress.discover(
            documents.len() as u64,
            &paths.support_docs_dir.to_string_lossy(),
        );

        if documents.is_empty() {
            tracing::warn!(
                "No documents in {:?} and no reference document at {:?}",
                paths.support_docs_dir,
                paths.reference_document
            );
            return Ok(BuildReport::error(0, NO_DOCUMENTS_MESSAGE));
        }

        let total = documents.len() as u64;
        let mut fragments: Vec<Fragment> = Vec::new();
        let mut sources = Vec::with_capacity(documents.len());

        for (i, document) in documents.iter().enumerate() {
            let extracted = self.extract(document).await;
            self.progress.extract(i as u64 + 1, total, &document.name);

            let mut record = SourceRecord {
                name: document.name.clone(),
                kind: document.kind.as_str().to_string(),
                bytes: extracted.bytes,
                sha256: extracted.sha256,
                chunks: 0,
                error: None,
            };

            match extracted.pages {
                Ok(pages) => {
                    let before = fragments.len();
                    for (page, text) in pages.iter().enumerate() {
                        for piece in self.policy.chunk(text) {
                            let seq = fragments.len() as u64;
                            fragments.push(Fragment {
                                id: Fragment::id_for(seq),
                                seq,
                                source: document.name.clone(),
                                page: page as u32,
                                text: piece,
                            });
                        }
                    }
                    record.chunks = fragments.len() - before;

                    tracing::debug!(
                        "Processed {}: {} pages, {} fragments",
                        document.name,
                        pages.len(),
                        record.chunks
                    );
                }
                Err(e) => {
                    let err = AppError::from(e);
                    tracing::warn!("Skipping {}: {}", document.name, err);
                    record.error = Some(err.to_string());
                }
            }

            self.progress.chunk(i as u64 + 1, total, fragments.len());
            sources.push(record);
        }

        if fragments.is_empty() {
            tracing::warn!("No text extracted from {} documents", documents.len());
            return Ok(BuildReport::error(documents.len(), NO_TEXT_MESSAGE));
        }

        let identity = embedder.identity();
        self.progress.embed(fragments.len() as u64, &identity.model);

        let texts: Vec<String> = fragments.iter().map(|f| f.text.clone()).collect();
        let vectors = embedder.embed(&texts).await?;
        if vectors.len() != fragments.len() {
            return Err(AppError::Embedding(format!(
                "Expected {} embeddings, got {}",
                fragments.len(),
                vectors.len()
            )));
        }

        let num_chunks = fragments.len();
        let records: Vec<IndexRecord> = fragments
            .into_iter()
            .zip(vectors)
            .map(|(fragment, vector)| IndexRecord { fragment, vector })
            .collect();

        // The old manifest must not outlive the snapshot it describes.
        IndexManifest::remove(&paths.index_dir)?;

        self.progress.index(num_chunks as u64);
        index.replace_all(records).await?;

        let manifest = IndexManifest {
            embedding: identity,
            distance: DISTANCE_METRIC.to_string(),
            chunk_size: self.policy.size(),
            chunk_overlap: self.policy.overlap(),
            built_at: Utc::now(),
            num_documents: documents.len(),
            num_chunks,
            sources,
        };
        manifest.save(&paths.index_dir).map_err(|e| {
            AppError::IndexUnavailable(format!(
                "Fragments were written but the manifest was not: {}",
                e
            ))
        })?;

        tracing::info!(
            "Build completed: {} documents, {} fragments in {:.2}s",
            documents.len(),
            num_chunks,
            start.elapsed().as_secs_f64()
        );

        Ok(BuildReport::ok(documents.len(), num_chunks))
    }

    /// Read and extract one document off the async runtime.
    async fn extract(&self, document: &Document) -> Extracted {
        let extractor = self.extractor;
        let doc = document.clone();

        let joined = tokio::task::spawn_blocking(move || {
            let bytes = match std::fs::read(&doc.path) {
                Ok(bytes) => bytes,
                Err(source) => {
                    return Extracted {
                        bytes: 0,
                        sha256: String::new(),
                        pages: Err(ExtractionError::Read {
                            path: doc.path.clone(),
                            source,
                        }),
                    }
                }
            };

            Extracted {
                bytes: bytes.len() as u64,
                sha256: content_hash(&bytes),
                pages: extractor.extract_loaded(&doc, &bytes),
            }
        })
        .await;

        joined.unwrap_or_else(|e| Extracted {
            bytes: 0,
            sha256: String::new(),
            pages: Err(ExtractionError::Aborted {
                path: document.path.clone(),
                reason: e.to_string(),
            }),
        })
    }
}

/// List the regular files directly inside `dir` (sorted by name, symlinks
/// followed), followed by `reference` when it exists.
///
/// A missing directory counts as empty.
pub fn collect_documents(dir: &Path, reference: &Path) -> AppResult<Vec<Document>> {
    let mut documents = Vec::new();

    if dir.is_dir() {
        for entry in WalkDir::new(dir)
            .follow_links(true)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                // Dangling or looping links are skipped; an unreadable directory is not.
                Err(e) if e.depth() > 0 => {
                    tracing::warn!("Skipping unreadable entry in {:?}: {}", dir, e);
                    continue;
                }
                Err(e) => {
                    return Err(AppError::Io(std::io::Error::other(format!(
                        "Failed to read {:?}: {}",
                        dir, e
                    ))))
                }
            };
            if entry.file_type().is_file() {
                documents.push(Document::from_path(entry.path()));
            }
        }
    } else {
        tracing::debug!("Support docs directory {:?} does not exist", dir);
    }

    if reference.is_file() && !documents.iter().any(|d| d.path == reference) {
        documents.push(Document::from_path(reference));
    }

    Ok(documents)
}
