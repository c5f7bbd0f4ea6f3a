//! Trigram embedding provider for local, offline operation.

use crate::embeddings::provider::EmbeddingProvider;
use qakb_core::AppResult;
use std::collections::BTreeMap;

/// Words too common to discriminate between fragments.
const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them",
];

/// Hashing embedding built from words and their character trigrams.
///
/// Not semantically aware like a neural model, but deterministic, free, and
/// content-dependent: texts sharing vocabulary land close together.
#[derive(Debug)]
pub struct TrigramProvider {
    model: String,
    dimensions: usize,
    normalize: bool,
}

impl TrigramProvider {
    pub fn new(model: &str, dimensions: usize, normalize: bool) -> Self {
        Self {
            model: model.to_string(),
            dimensions,
            normalize,
        }
    }

    fn generate(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];
        if self.dimensions == 0 {
            return embedding;
        }

        let lower = text.to_lowercase();
        let mut words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty() && !STOP_WORDS.contains(w))
            .collect();

        // Text made only of punctuation or stop words still gets a signature.
        let trimmed = lower.trim();
        if words.is_empty() && !trimmed.is_empty() {
            words.push(trimmed);
        }

        // BTreeMap keeps accumulation order fixed, so float sums are reproducible.
        let mut word_freq: BTreeMap<&str, u32> = BTreeMap::new();
        for word in words {
            *word_freq.entry(word).or_insert(0) += 1;
        }

        for (word, freq) in &word_freq {
            let weight = (*freq as f32).sqrt();

            let padded: Vec<char> = std::iter::once(' ')
                .chain(word.chars())
                .chain(std::iter::once(' '))
                .collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                embedding[self.bucket(&trigram, 0x9e37)] += weight;
            }

            embedding[self.bucket(word, 0x51ed)] += *freq as f32;
        }

        if self.normalize {
            let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for v in &mut embedding {
                    *v /= norm;
                }
            }
        }

        embedding
    }

    /// FNV-1a over the bytes of `token`, seeded so words and trigrams spread differently.
    fn bucket(&self, token: &str, seed: u64) -> usize {
        let hash = token
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325u64 ^ seed, |acc, b| {
                (acc ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
            });
        (hash % self.dimensions as u64) as usize
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for TrigramProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.generate(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> TrigramProvider {
        TrigramProvider::new("trigram-v1", 384, true)
    }

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_trigram_provider_embed_single() {
        let embedding = provider().embed("hello world").await.unwrap();

        assert_eq!(embedding.len(), 384);
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_trigram_provider_batch_order() {
        let p = provider();
        let texts = vec![
            "checkout form".to_string(),
            "discount code".to_string(),
            "shipping options".to_string(),
        ];

        let batch = p.embed_batch(&texts).await.unwrap();
        assert_eq!(batch.len(), 3);
        for (text, vector) in texts.iter().zip(&batch) {
            assert_eq!(&p.embed(text).await.unwrap(), vector);
        }
    }

    #[tokio::test]
    async fn test_trigram_provider_deterministic() {
        let a = provider().embed("deterministic test").await.unwrap();
        let b = provider().embed("deterministic test").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_shared_vocabulary_is_closer() {
        let p = provider();
        let query = p.embed("apply discount code").await.unwrap();
        let related = p.embed("the discount code SAVE15 gives 15% off").await.unwrap();
        let unrelated = p.embed("express shipping costs extra").await.unwrap();

        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let embedding = provider().embed("").await.unwrap();
        assert!(embedding.iter().all(|&x| x == 0.0));
    }

    #[tokio::test]
    async fn test_stop_words_only_still_embedded() {
        let embedding = provider().embed("the of and").await.unwrap();
        assert!(embedding.iter().any(|&x| x != 0.0));
    }

    #[tokio::test]
    async fn test_utf8_safety() {
        let embedding = provider()
            .embed("Gamedex é um aplicativo 🎮 brasileiro")
            .await
            .unwrap();
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.001);
    }
}
