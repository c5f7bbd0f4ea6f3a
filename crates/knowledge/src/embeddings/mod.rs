//! Embedding engine for the knowledge base.
//!
//! Wraps one provider, selected from configuration for the process lifetime,
//! and enforces the batch contract: same length out as in, input order kept,
//! every vector of the configured dimension.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::{EmbeddingConfig, EmbeddingIdentity};
pub use provider::{create_provider, EmbeddingProvider};

use qakb_core::{AppError, AppResult};
use std::sync::Arc;

/// Stand-in for blank text, which some providers refuse to embed.
pub const EMPTY_PLACEHOLDER: &str = "[empty]";

/// Provider-agnostic embedder used both at build time and at query time.
#[derive(Debug, Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl Embedder {
    /// Create the embedder described by `config`.
    pub async fn from_config(config: &EmbeddingConfig) -> AppResult<Self> {
        let provider = create_provider(config).await?;

        tracing::debug!(
            "Created embedding provider: provider={}, model={}, dimensions={}",
            provider.provider_name(),
            provider.model_name(),
            provider.dimensions()
        );

        Ok(Self::new(provider, config.batch_size))
    }

    pub fn new(provider: Arc<dyn EmbeddingProvider>, batch_size: usize) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    pub fn identity(&self) -> EmbeddingIdentity {
        EmbeddingIdentity {
            provider: self.provider.provider_name().to_string(),
            model: self.provider.model_name().to_string(),
            dimensions: self.provider.dimensions(),
        }
    }

    /// Embed `texts`, returning one vector per input in the same order.
    pub async fn embed(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        tracing::info!(
            "Embedding {} texts using provider '{}' (model: {})",
            texts.len(),
            self.provider.provider_name(),
            self.provider.model_name()
        );

        let prepared: Vec<String> = texts
            .iter()
            .map(|text| {
                if text.trim().is_empty() {
                    EMPTY_PLACEHOLDER.to_string()
                } else {
                    text.clone()
                }
            })
            .collect();

        let mut embeddings = Vec::with_capacity(prepared.len());
        for (batch_index, batch) in prepared.chunks(self.batch_size).enumerate() {
            tracing::debug!("Embedding batch {} ({} texts)", batch_index, batch.len());

            let vectors = self.provider.embed_batch(batch).await?;
            if vectors.len() != batch.len() {
                return Err(AppError::Config(format!(
                    "Embedding provider '{}' returned {} vectors for {} texts",
                    self.provider.provider_name(),
                    vectors.len(),
                    batch.len()
                )));
            }
            embeddings.extend(vectors);
        }

        let expected = self.dimensions();
        if let Some(bad) = embeddings.iter().find(|v| v.len() != expected) {
            return Err(AppError::Config(format!(
                "Embedding dimension mismatch: expected {}, got {}",
                expected,
                bad.len()
            )));
        }

        tracing::debug!(
            "Generated {} embeddings of dimension {}",
            embeddings.len(),
            expected
        );

        Ok(embeddings)
    }

    /// Embed a single text.
    pub async fn embed_one(&self, text: &str) -> AppResult<Vec<f32>> {
        self.embed(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned".to_string()))
    }
}
