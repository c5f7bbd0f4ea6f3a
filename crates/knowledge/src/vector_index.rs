//! Vector index abstraction for knowledge fragments.
//!
//! Defines a trait for backend-agnostic vector storage and retrieval.

use crate::types::{IndexRecord, ScoredFragment};
use async_trait::async_trait;
use qakb_core::AppResult;

/// Trait for vector index backends.
///
/// Implementations must support:
/// - Replacing the whole snapshot in one operation
/// - Searching for the nearest vectors by cosine distance (top-k)
/// - Counting stored fragments
/// - Clearing the index
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Discard prior contents and store `records` as the new snapshot.
    async fn replace_all(&mut self, records: Vec<IndexRecord>) -> AppResult<()>;

    /// Return up to `k` fragments nearest to `vector`, best match first.
    ///
    /// Ties are broken by insertion order. An empty or missing index yields
    /// an empty list.
    async fn query(&self, vector: &[f32], k: usize) -> AppResult<Vec<ScoredFragment>>;

    /// Number of stored fragments.
    async fn count(&self) -> AppResult<usize>;

    /// Remove every stored fragment.
    async fn clear(&mut self) -> AppResult<()>;
}
