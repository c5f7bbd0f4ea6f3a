//! Embedding configuration types.

use qakb_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Providers understood by [`crate::embeddings::create_provider`].
pub const KNOWN_PROVIDERS: &[&str] = &["trigram", "ollama"];

/// Embedding configuration for the knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "trigram" or "ollama"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model identifier (provider-specific)
    #[serde(default = "default_model")]
    pub model: String,

    /// Embedding vector dimensions
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Whether to normalize embeddings to unit length
    #[serde(default = "default_normalize")]
    pub normalize: bool,

    /// Maximum number of texts per provider call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Provider endpoint (Ollama base URL)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Per-request timeout for remote providers
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "trigram".to_string()
}

fn default_model() -> String {
    "trigram-v1".to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_normalize() -> bool {
    true
}

fn default_batch_size() -> usize {
    100
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            dimensions: default_dimensions(),
            normalize: default_normalize(),
            batch_size: default_batch_size(),
            endpoint: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_PROVIDERS.contains(&self.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: '{}'. Supported providers: {}",
                self.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if self.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be greater than zero".to_string(),
            ));
        }

        if self.batch_size == 0 {
            return Err(AppError::Config(
                "Embedding batch_size must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// The identity vectors produced under this config carry.
    pub fn identity(&self) -> EmbeddingIdentity {
        EmbeddingIdentity {
            provider: self.provider.clone(),
            model: self.model.clone(),
            dimensions: self.dimensions,
        }
    }
}

/// What makes two sets of vectors comparable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingIdentity {
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
}

impl EmbeddingIdentity {
    /// Fail unless `other` was produced by the same embedding function.
    pub fn ensure_matches(&self, other: &Self) -> AppResult<()> {
        if self != other {
            return Err(AppError::Config(format!(
                "Embedding mismatch: index was built with {}, current embedder is {}. \
                 Rebuild the knowledge base.",
                self, other
            )));
        }
        Ok(())
    }
}

impl fmt::Display for EmbeddingIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({}d)", self.provider, self.model, self.dimensions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.provider, "trigram");
        assert_eq!(config.model, "trigram-v1");
        assert_eq!(config.dimensions, 384);
        assert!(config.normalize);
        assert_eq!(config.batch_size, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let config = EmbeddingConfig {
            provider: "word2vec".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let config = EmbeddingConfig {
            dimensions: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_identity_mismatch() {
        let built = EmbeddingConfig::default().identity();
        let current = EmbeddingConfig {
            dimensions: 768,
            ..Default::default()
        }
        .identity();

        assert!(built.ensure_matches(&built.clone()).is_ok());
        let err = built.ensure_matches(&current).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("trigram/trigram-v1 (384d)"));
    }
}
