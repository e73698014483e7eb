//! Assembles retrieved chunks and matched rules into a [`RagContext`].

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::rules::{section_matches, RuleProvider};
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::retrieval::Retriever;
use crate::store::VectorStore;
use crate::types::{BuildingRule, RagContext, RetrievalConfig, RetrievedChunk};

/// Builds the bounded, scored evidence bundle for a query.
pub struct ContextAssembler {
    embedder: Arc<Embedder>,
    store: Arc<VectorStore>,
    rules: Arc<dyn RuleProvider>,
    retriever: Retriever,
    config: RetrievalConfig,
    min_rule_confidence: f32,
}

impl ContextAssembler {
    pub fn new(
        embedder: Arc<Embedder>,
        store: Arc<VectorStore>,
        rules: Arc<dyn RuleProvider>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            rules,
            retriever: Retriever::new(),
            config,
            min_rule_confidence: 0.0,
        }
    }

    /// Ignore rules extracted with confidence below `threshold`.
    pub fn with_min_rule_confidence(mut self, threshold: f32) -> Self {
        self.min_rule_confidence = threshold;
        self
    }

    /// Retrieve at most `max_chunks` chunks for `query` and join matching rules.
    pub async fn create_context(&self, query: &str, max_chunks: usize) -> Result<RagContext> {
        self.create_context_cancellable(query, max_chunks, &CancellationToken::new())
            .await
    }

    pub async fn create_context_cancellable(
        &self,
        query: &str,
        max_chunks: usize,
        cancel: &CancellationToken,
    ) -> Result<RagContext> {
        if max_chunks == 0 {
            return Ok(RagContext::empty(query, max_chunks));
        }

        let snapshot = self.store.snapshot();
        if snapshot.is_empty() {
            debug!("No stored vectors, returning empty context");
            return Ok(RagContext::empty(query, max_chunks));
        }

        let query_vector = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RagError::Cancelled),
            vector = self.embedder.embed_query(query) => vector?,
        };

        if let Some(dimension) = snapshot.dimension() {
            if dimension != query_vector.len() {
                return Err(RagError::Validation(format!(
                    "query vector has dimensionality {} but the store holds {}",
                    query_vector.len(),
                    dimension
                )));
            }
        }

        // The scan is CPU-bound; run it off the async workers under a deadline
        let search_cancel = cancel.child_token();
        let token = search_cancel.clone();
        let retriever = self.retriever;
        let limit = max_chunks.min(snapshot.len());
        let handle = tokio::task::spawn_blocking(move || {
            retriever.search_cancellable(&query_vector, snapshot.iter(), limit, &token)
        });

        let timeout = self.config.search_timeout();
        let relevant_chunks = match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join_error)) => {
                if join_error.is_panic() {
                    std::panic::resume_unwind(join_error.into_panic());
                }
                return Err(RagError::Cancelled);
            }
            Err(_) => {
                search_cancel.cancel();
                return Err(RagError::Timeout(timeout));
            }
        };

        let building_rules = self.join_rules(&relevant_chunks).await;
        let confidence_score = relevant_chunks
            .first()
            .map_or(0.0, |best| best.similarity_score.clamp(0.0, 1.0));

        info!(
            chunks = relevant_chunks.len(),
            rules = building_rules.len(),
            confidence = confidence_score,
            "Assembled context"
        );

        Ok(RagContext {
            query: query.to_string(),
            relevant_chunks,
            building_rules,
            confidence_score,
            max_chunks,
        })
    }

    /// Rules of each retrieved chunk's document whose section matches the
    /// chunk's, deduplicated, in order of the first chunk they match.
    async fn join_rules(&self, chunks: &[RetrievedChunk]) -> Vec<BuildingRule> {
        let mut document_ids: Vec<&str> = Vec::new();
        for chunk in chunks {
            if !document_ids.contains(&chunk.document_id.as_str()) {
                document_ids.push(&chunk.document_id);
            }
        }

        let mut per_document = Vec::with_capacity(document_ids.len());
        for document_id in document_ids {
            let rules: Vec<BuildingRule> = self
                .rules
                .rules_for_document(document_id)
                .await
                .into_iter()
                .filter(|rule| rule.confidence >= self.min_rule_confidence)
                .collect();
            per_document.push((document_id, rules));
        }

        let mut matched: Vec<BuildingRule> = Vec::new();
        for chunk in chunks {
            let Some((_, rules)) = per_document
                .iter()
                .find(|(id, _)| *id == chunk.document_id)
            else {
                continue;
            };
            for rule in rules {
                if section_matches(&rule.source_section, chunk.section.as_deref())
                    && !matched.contains(rule)
                {
                    matched.push(rule.clone());
                }
            }
        }
        matched
    }
}
