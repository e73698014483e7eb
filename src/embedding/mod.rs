//! Embedding capability, caching and the batching embedder.

mod cache;
mod embedder;
mod hash_provider;
mod http_provider;
mod inflight;
mod provider;
mod retry;

pub use cache::{CacheStats, EmbeddingCache};
pub use embedder::Embedder;
pub use hash_provider::HashEmbeddingProvider;
pub use http_provider::HttpEmbeddingProvider;
pub use provider::EmbeddingProvider;
pub use retry::RetryPolicy;
