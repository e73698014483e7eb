//! Deterministic, offline embedding provider.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::provider::EmbeddingProvider;

/// Feature-hashing provider: every lowercase word is hashed into one of
/// `dimensions` buckets with a hashed sign, and the result is L2-normalised.
///
/// Texts sharing vocabulary get similar vectors, which is enough for local
/// runs and tests without an embedding service.
pub struct HashEmbeddingProvider {
    dimensions: usize,
    provider_key: String,
}

impl HashEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            provider_key: format!("hash:{}", dimensions.max(1)),
        }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let words = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase);

        for word in words {
            let digest = Sha256::digest(word.as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let index = (u64::from_le_bytes(bucket) % self.dimensions as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

impl Default for HashEmbeddingProvider {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    fn model_name(&self) -> &str {
        "feature-hash"
    }

    fn provider_key(&self) -> &str {
        &self.provider_key
    }
}
