//! Query answering: embed the query, return the nearest stored fragments.

use crate::embeddings::Embedder;
use crate::manifest::IndexManifest;
use crate::types::RetrievedContext;
use crate::vector_index::VectorIndex;
use qakb_core::AppResult;

/// Return up to `k` fragments most similar to `query`, best first.
///
/// When `manifest` is given, the stored vectors must come from the same
/// embedding function as `embedder`.
pub async fn retrieve(
    embedder: &Embedder,
    index: &dyn VectorIndex,
    manifest: Option<&IndexManifest>,
    query: &str,
    k: usize,
) -> AppResult<Vec<RetrievedContext>> {
    if let Some(manifest) = manifest {
        manifest.embedding.ensure_matches(&embedder.identity())?;
    }

    if k == 0 {
        return Ok(Vec::new());
    }

    let vector = embedder.embed_one(query).await?;
    let results = index.query(&vector, k).await?;

    tracing::info!(
        "Retrieved {} fragments (top distance: {:.3})",
        results.len(),
        results.first().map(|r| r.distance).unwrap_or(0.0)
    );

    Ok(results.into_iter().map(RetrievedContext::from).collect())
}
