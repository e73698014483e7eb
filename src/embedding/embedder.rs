//! Batching, caching, retrying front end over an [`EmbeddingProvider`].

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::cache::{CacheStats, EmbeddingCache};
use super::inflight::{Claim, EmbedResult, InFlight};
use super::provider::EmbeddingProvider;
use super::retry::RetryPolicy;
use crate::error::{RagError, Result};
use crate::types::{DocumentChunk, EmbedderConfig, EmbeddingFailure, EmbeddingOutcome};

type Keyed<T> = (String, T);

/// Maps chunk text to vectors.
///
/// Identical texts are embedded once per process, including texts another
/// concurrent call is already embedding. Uncached texts are sent to
/// the provider in batches of at most `max_batch_size`, with up to
/// `max_concurrency` batches in flight. A batch that keeps failing is retried
/// text by text so that one bad chunk cannot sink its neighbours.
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    cache: EmbeddingCache,
    in_flight: InFlight,
    config: EmbedderConfig,
    retry: RetryPolicy,
}

impl Embedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: EmbedderConfig) -> Self {
        let cache = EmbeddingCache::new(provider.provider_key());
        let retry = RetryPolicy::from_config(&config);
        Self {
            provider,
            cache,
            in_flight: InFlight::default(),
            config,
            retry,
        }
    }

    /// Replace the retry schedule (e.g. to disable jitter).
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Embed chunks, returning one outcome per chunk in input order.
    ///
    /// Fails with [`RagError::IndexingFailed`] only when every chunk failed.
    pub async fn embed(&self, chunks: Vec<DocumentChunk>) -> Result<Vec<EmbeddingOutcome>> {
        if chunks.is_empty() {
            return Ok(vec![]);
        }

        let keys: Vec<String> = chunks.iter().map(|c| self.cache.key_for(&c.text)).collect();
        let mut claims = self.in_flight.claims();
        let mut resolved: HashMap<String, EmbedResult> = HashMap::new();
        let mut pending: Vec<Keyed<String>> = Vec::new();
        let mut waiting = Vec::new();
        let mut seen = HashSet::new();

        for (chunk, key) in chunks.iter().zip(&keys) {
            if !seen.insert(key.as_str()) {
                continue;
            }
            match claims.claim(key, &self.cache) {
                Claim::Cached(vector) => {
                    resolved.insert(key.clone(), Ok(vector));
                }
                Claim::Wait(call) => waiting.push((key.clone(), chunk.text.clone(), call)),
                Claim::Owned => pending.push((key.clone(), chunk.text.clone())),
            }
        }

        debug!(
            chunks = chunks.len(),
            unique = seen.len(),
            uncached = pending.len(),
            shared = waiting.len(),
            "Embedding chunks"
        );

        let batches: Vec<Vec<Keyed<String>>> = pending
            .chunks(self.config.max_batch_size)
            .map(|batch| batch.to_vec())
            .collect();

        let results: Vec<Vec<Keyed<EmbedResult>>> = stream::iter(batches)
            .map(|batch| self.embed_batch(batch))
            .buffer_unordered(self.config.max_concurrency)
            .collect()
            .await;

        // Publish owned results before waiting on anyone else's
        for (key, result) in results.into_iter().flatten() {
            claims.complete(&key, result.clone(), &self.cache);
            resolved.insert(key, result);
        }

        for (key, text, call) in waiting {
            let result = match call.await {
                Ok(result) => result,
                // The owning call was dropped before it finished
                Err(_) => self.embed_uncoordinated(&key, &text).await,
            };
            resolved.insert(key, result);
        }

        let outcomes: Vec<EmbeddingOutcome> = chunks
            .into_iter()
            .zip(keys)
            .map(|(chunk, key)| {
                let result = resolved.get(&key).cloned().unwrap_or_else(|| {
                    Err(EmbeddingFailure {
                        attempts: 0,
                        message: "no embedding produced".to_string(),
                    })
                });
                EmbeddingOutcome { chunk, result }
            })
            .collect();

        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        if failed == outcomes.len() {
            warn!(failed, "Every chunk in the batch failed to embed");
            return Err(RagError::IndexingFailed {
                document_id: outcomes[0].chunk.document_id.clone(),
                failed,
            });
        }
        if failed > 0 {
            warn!(failed, total = outcomes.len(), "Some chunks failed to embed");
        }

        Ok(outcomes)
    }

    /// [`embed`](Self::embed) that stops early when `cancel` fires.
    ///
    /// Vectors already computed stay cached.
    pub async fn embed_cancellable(
        &self,
        chunks: Vec<DocumentChunk>,
        cancel: &CancellationToken,
    ) -> Result<Vec<EmbeddingOutcome>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RagError::Cancelled),
            result = self.embed(chunks) => result,
        }
    }

    /// Embed a query string.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let key = self.cache.key_for(text);
        let mut claims = self.in_flight.claims();

        let result = match claims.claim(&key, &self.cache) {
            Claim::Cached(vector) => return Ok(vector),
            Claim::Wait(call) => match call.await {
                Ok(result) => result,
                Err(_) => self.embed_uncoordinated(&key, text).await,
            },
            Claim::Owned => {
                let result = self.embed_single(text).await;
                claims.complete(&key, result.clone(), &self.cache);
                result
            }
        };

        result.map_err(|failure| RagError::Embedding(failure.to_string()))
    }

    async fn embed_single(&self, text: &str) -> EmbedResult {
        let provider = &self.provider;
        self.call_with_retry(1, || async move { provider.embed(text).await.map(|v| vec![v]) })
            .await
            .map(|mut vectors| vectors.remove(0))
    }

    /// Embed and cache outside the in-flight registry.
    async fn embed_uncoordinated(&self, key: &str, text: &str) -> EmbedResult {
        let result = self.embed_single(text).await;
        if let Ok(vector) = &result {
            self.cache.insert(key.to_string(), vector.clone());
        }
        result
    }

    /// Embed one provider batch, falling back to single texts if the batch keeps failing.
    async fn embed_batch(&self, batch: Vec<Keyed<String>>) -> Vec<Keyed<EmbedResult>> {
        let texts: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();
        let provider = &self.provider;
        let texts_ref = &texts;

        let failure = match self
            .call_with_retry(texts.len(), || provider.embed_batch(texts_ref))
            .await
        {
            Ok(vectors) => {
                return batch
                    .into_iter()
                    .map(|(key, _)| key)
                    .zip(vectors.into_iter().map(Ok))
                    .collect();
            }
            Err(failure) => failure,
        };

        if batch.len() == 1 {
            return batch.into_iter().map(|(key, _)| (key, Err(failure.clone()))).collect();
        }

        warn!(
            batch_size = batch.len(),
            error = %failure,
            "Batch embedding failed, retrying texts individually"
        );

        let mut results = Vec::with_capacity(batch.len());
        for (key, text) in batch {
            let result = self.embed_single(&text).await;
            results.push((key, result));
        }
        results
    }

    /// Call the provider with per-call timeout and bounded retries.
    ///
    /// A response with the wrong number of vectors counts as a failed attempt.
    async fn call_with_retry<F, Fut>(
        &self,
        expected: usize,
        mut call: F,
    ) -> std::result::Result<Vec<Vec<f32>>, EmbeddingFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<Vec<Vec<f32>>>>,
    {
        let timeout = self.config.request_timeout();
        let mut last_error = String::new();

        for attempt in 1..=self.retry.max_attempts {
            last_error = match tokio::time::timeout(timeout, call()).await {
                Ok(Ok(vectors)) if vectors.len() == expected => return Ok(vectors),
                Ok(Ok(vectors)) => format!(
                    "provider returned {} vector(s) for {} input(s)",
                    vectors.len(),
                    expected
                ),
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("timed out after {:?}", timeout),
            };

            if attempt < self.retry.max_attempts {
                let delay = self.retry.backoff(attempt);
                warn!(
                    attempt,
                    max_attempts = self.retry.max_attempts,
                    error = %last_error,
                    ?delay,
                    "Embedding call failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }

        warn!(attempts = self.retry.max_attempts, error = %last_error, "Embedding call gave up");
        Err(EmbeddingFailure {
            attempts: self.retry.max_attempts,
            message: last_error,
        })
    }
}
