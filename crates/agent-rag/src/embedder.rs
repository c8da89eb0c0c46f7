//! Feature-hashing embedder
//!
//! Deterministic, dependency-free embeddings for offline use and tests.
//! Lowercase alphanumeric tokens are hashed with FNV-1a into a fixed number
//! of buckets; the sign bit of the hash decides the contribution's sign. The
//! result is L2-normalised, so cosine similarity reduces to a dot product.

use agent_core::error::{AgentError, Result};
use agent_core::retrieval::Embedder;
use async_trait::async_trait;

/// Default vector length
pub const DEFAULT_DIMENSIONS: usize = 256;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(FNV_OFFSET, |hash, &b| (hash ^ u64::from(b)).wrapping_mul(FNV_PRIME))
}

#[derive(Clone, Debug)]
pub struct HashingEmbedder {
    dimensions: usize,
    model: String,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self {
            dimensions,
            model: format!("hashing-fnv1a-{dimensions}"),
        }
    }

    pub const fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Synchronous embedding
    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(AgentError::Embedding("cannot embed empty text".into()));
        }

        let mut vector = vec![0.0f32; self.dimensions];
        let buckets = self.dimensions as u64;
        let mut tokens = 0usize;
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(token.to_lowercase().as_bytes());
            // Bucket index is below `dimensions`, so the cast is lossless
            #[allow(clippy::cast_possible_truncation)]
            let bucket = (hash % buckets) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
            tokens += 1;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if tokens == 0 || norm == 0.0 {
            return Err(AgentError::Embedding(format!(
                "no alphanumeric tokens in {:?}",
                text.chars().take(40).collect::<String>()
            )));
        }
        for v in &mut vector {
            *v /= norm;
        }
        Ok(vector)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_text(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_deterministic_and_normalised() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.embed_text("The sky is blue.").unwrap();
        let b = embedder.embed_text("The sky is blue.").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!((dot(&a, &a) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        let embedder = HashingEmbedder::default();
        assert_eq!(
            embedder.embed_text("Sky, BLUE!").unwrap(),
            embedder.embed_text("sky blue").unwrap()
        );
    }

    #[test]
    fn test_shared_words_score_higher() {
        let embedder = HashingEmbedder::default();
        let query = embedder.embed_text("sky color").unwrap();
        let sky = embedder.embed_text("The sky is blue.").unwrap();
        let grass = embedder.embed_text("Grass grows in spring.").unwrap();
        assert!(dot(&query, &sky) > dot(&query, &grass));
    }

    #[tokio::test]
    async fn test_blank_text_fails() {
        let embedder = HashingEmbedder::default();
        assert!(matches!(embedder.embed("  ").await, Err(AgentError::Embedding(_))));
        assert!(matches!(embedder.embed("?!").await, Err(AgentError::Embedding(_))));
    }
}
