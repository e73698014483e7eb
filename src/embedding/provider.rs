//! Provider-agnostic embedding capability.

use async_trait::async_trait;

/// An external capability mapping text to a fixed-dimension vector.
///
/// Calls may fail transiently; the [`Embedder`](super::Embedder) owns retries,
/// batching and caching, so implementations should stay thin.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    /// Generate embeddings for a batch of texts, one vector per input in input order.
    /// Default implementation calls `embed` sequentially.
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// The model name used by this provider (e.g. "text-embedding-3-small").
    fn model_name(&self) -> &str;

    /// A stable key identifying this provider configuration, used to keep
    /// cached vectors from different models apart.
    fn provider_key(&self) -> &str;
}
