//! The retrieval engine: chunking, embedding, storage, retrieval and prompt
//! augmentation wired together.
//!
//! Construct one [`RagEngine`] at process start and share it by reference
//! (or `Arc`) with whatever orchestrates generation requests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::chunkers::{Chunker, SlidingWindowChunker};
use crate::context::{ContextAssembler, RuleProvider};
use crate::embedding::{Embedder, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::prompt::PromptAugmenter;
use crate::store::VectorStore;
use crate::types::{ChunkingConfig, RagConfig, RagContext};

/// What an `index_document` call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub document_id: String,
    /// Stored version, or `None` if the document is now absent (empty text)
    pub version: Option<u64>,
    /// Chunks produced by the chunker
    pub chunks: usize,
    /// Chunks stored with a vector
    pub embedded: usize,
    /// Chunk indices that failed to embed and were left out; re-queue these
    pub failed: Vec<usize>,
}

impl IndexReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct RagEngine {
    config: RagConfig,
    chunker: Arc<dyn Chunker>,
    embedder: Arc<Embedder>,
    store: Arc<VectorStore>,
    assembler: ContextAssembler,
    augmenter: PromptAugmenter,
    /// Serialises re-indexing per document
    document_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RagEngine {
    /// Build an engine around an embedding capability and a rule source.
    pub fn new(
        config: RagConfig,
        provider: Arc<dyn EmbeddingProvider>,
        rules: Arc<dyn RuleProvider>,
    ) -> Result<Self> {
        config.validate()?;

        let embedder = Arc::new(Embedder::new(provider, config.embedder.clone()));
        let store = Arc::new(VectorStore::new());
        let assembler = ContextAssembler::new(
            Arc::clone(&embedder),
            Arc::clone(&store),
            rules,
            config.retrieval.clone(),
        )
        .with_min_rule_confidence(config.prompt.min_rule_confidence);

        info!(
            model = embedder.model_name(),
            chunk_size = config.chunking.chunk_size,
            overlap = config.chunking.overlap_size,
            "Retrieval engine ready"
        );

        Ok(Self {
            config,
            chunker: Arc::new(SlidingWindowChunker::new()),
            embedder,
            store,
            assembler,
            augmenter: PromptAugmenter::new(),
            document_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Use a different chunking strategy.
    pub fn with_chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<Embedder> {
        &self.embedder
    }

    /// (Re)build the chunk and embedding set for a document.
    ///
    /// The new set replaces the old one atomically. If every chunk fails to
    /// embed the call fails with [`RagError::IndexingFailed`] and the previous
    /// version stays authoritative.
    pub async fn index_document(
        &self,
        document_id: &str,
        text: &str,
        chunk_size: usize,
        overlap_size: usize,
    ) -> Result<IndexReport> {
        self.index_document_cancellable(
            document_id,
            text,
            chunk_size,
            overlap_size,
            &CancellationToken::new(),
        )
        .await
    }

    /// [`index_document`](Self::index_document) with the configured chunk size and overlap.
    pub async fn index_with_defaults(&self, document_id: &str, text: &str) -> Result<IndexReport> {
        let chunking = &self.config.chunking;
        self.index_document(document_id, text, chunking.chunk_size, chunking.overlap_size)
            .await
    }

    /// Cancellation leaves the store untouched.
    pub async fn index_document_cancellable(
        &self,
        document_id: &str,
        text: &str,
        chunk_size: usize,
        overlap_size: usize,
        cancel: &CancellationToken,
    ) -> Result<IndexReport> {
        let chunking = ChunkingConfig {
            chunk_size,
            overlap_size,
            boundary_tolerance: self.config.chunking.boundary_tolerance,
        };
        let chunks = self.chunker.chunk(document_id, text, &chunking)?;
        let chunk_count = chunks.len();

        let lock = self.document_lock(document_id);
        let _guard = lock.lock().await;

        if chunks.is_empty() {
            self.store.remove(document_id);
            info!(document_id, "Empty document, removed from index");
            return Ok(IndexReport {
                document_id: document_id.to_string(),
                version: None,
                chunks: 0,
                embedded: 0,
                failed: Vec::new(),
            });
        }

        let outcomes = self.embedder.embed_cancellable(chunks, cancel).await?;

        let mut embeddings = Vec::with_capacity(outcomes.len());
        let mut failed = Vec::new();
        for outcome in outcomes {
            match outcome.into_embedding() {
                Ok(embedding) => embeddings.push(embedding),
                Err((chunk, failure)) => {
                    warn!(
                        document_id,
                        chunk_index = chunk.chunk_index,
                        error = %failure,
                        "Chunk left out of index"
                    );
                    failed.push(chunk.chunk_index);
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(RagError::Cancelled);
        }

        let embedded = embeddings.len();
        let version = self.store.add(document_id, embeddings)?;

        info!(
            document_id,
            version,
            chunks = chunk_count,
            embedded,
            failed = failed.len(),
            "Indexed document"
        );

        Ok(IndexReport {
            document_id: document_id.to_string(),
            version: Some(version),
            chunks: chunk_count,
            embedded,
            failed,
        })
    }

    /// Drop a document from the index. Returns whether it was present.
    pub fn remove_document(&self, document_id: &str) -> bool {
        self.store.remove(document_id)
    }

    /// Structured retrieval result for a query.
    pub async fn get_context(&self, query_text: &str, max_chunks: usize) -> Result<RagContext> {
        self.assembler.create_context(query_text, max_chunks).await
    }

    pub async fn get_context_cancellable(
        &self,
        query_text: &str,
        max_chunks: usize,
        cancel: &CancellationToken,
    ) -> Result<RagContext> {
        self.assembler
            .create_context_cancellable(query_text, max_chunks, cancel)
            .await
    }

    /// Retrieve evidence for `query_text` and fold it into the query as a prompt fragment.
    pub async fn query(
        &self,
        query_text: &str,
        max_chunks: usize,
        max_context_length: usize,
    ) -> Result<String> {
        let context = self.get_context(query_text, max_chunks).await?;
        Ok(self.augmenter.augment(query_text, &context, max_context_length))
    }

    /// Augment an arbitrary prompt with an already-assembled context.
    pub fn augment(&self, prompt: &str, context: &RagContext, max_context_length: usize) -> String {
        self.augmenter.augment(prompt, context, max_context_length)
    }

    fn document_lock(&self, document_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .document_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(document_id.to_string()).or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NoRules;
    use crate::embedding::HashEmbeddingProvider;

    fn engine() -> RagEngine {
        RagEngine::new(
            RagConfig::default(),
            Arc::new(HashEmbeddingProvider::new(64)),
            Arc::new(NoRules),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut config = RagConfig::default();
        config.chunking.overlap_size = config.chunking.chunk_size;
        let result = RagEngine::new(config, Arc::new(HashEmbeddingProvider::new(8)), Arc::new(NoRules));
        assert!(matches!(result, Err(RagError::Validation(_))));
    }

    #[tokio::test]
    async fn test_index_reports_chunks() {
        let engine = engine();
        let text = "Guards are required where the drop exceeds 30 inches. ".repeat(30);
        let report = engine.index_document("ibc", &text, 200, 20).await.unwrap();

        assert_eq!(report.version, Some(1));
        assert!(report.chunks > 1);
        assert_eq!(report.embedded, report.chunks);
        assert!(report.is_complete());
        assert_eq!(engine.store().get("ibc").len(), report.chunks);
    }

    #[tokio::test]
    async fn test_invalid_chunking_is_validation_error() {
        let engine = engine();
        let err = engine.index_document("doc", "text", 10, 10).await.unwrap_err();
        assert!(matches!(err, RagError::Validation(_)));
        assert!(engine.store().is_empty());
    }

    #[tokio::test]
    async fn test_empty_text_removes_document() {
        let engine = engine();
        engine.index_with_defaults("doc", "Some regulatory text.").await.unwrap();
        let report = engine.index_with_defaults("doc", "").await.unwrap();
        assert_eq!(report.version, None);
        assert!(engine.store().get("doc").is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_index_leaves_store_untouched() {
        let engine = engine();
        engine.index_with_defaults("doc", "Version one text.").await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = engine
            .index_document_cancellable("doc", "Version two text.", 100, 10, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, RagError::Cancelled));
        assert_eq!(engine.store().version("doc"), Some(1));
        assert_eq!(engine.store().get("doc")[0].text, "Version one text.");
    }

    #[tokio::test]
    async fn test_query_without_index_returns_prompt() {
        let engine = engine();
        let out = engine.query("Where do exits go?", 5, 1_000).await.unwrap();
        assert_eq!(out, "Where do exits go?");
    }
}
