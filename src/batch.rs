//! Batch indexing for loading a corpus of regulatory documents.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::engine::{IndexReport, RagEngine};
use crate::error::Result;
use crate::types::ChunkingConfig;

/// Configuration for batch indexing.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum documents indexed concurrently
    pub concurrency: usize,
    /// Whether to continue on individual document failures
    pub continue_on_error: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            continue_on_error: true,
        }
    }
}

/// A document to index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInput {
    pub document_id: String,
    pub text: String,
}

impl DocumentInput {
    pub fn new(document_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            text: text.into(),
        }
    }
}

/// Result of batch indexing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    pub total_documents: usize,
    pub indexed_documents: usize,
    pub failed_documents: usize,
    pub total_chunks: usize,
    /// Chunks left out of otherwise indexed documents
    pub failed_chunks: usize,
    pub errors: Vec<BatchError>,
}

/// Error during batch indexing.
#[derive(Debug, Clone, Serialize)]
pub struct BatchError {
    pub document_id: String,
    pub error: String,
}

/// Indexes many documents through one [`RagEngine`].
pub struct BatchIndexer {
    engine: Arc<RagEngine>,
    config: BatchConfig,
}

impl BatchIndexer {
    pub fn new(engine: Arc<RagEngine>, config: BatchConfig) -> Self {
        Self { engine, config }
    }

    /// Index every document and return the per-document reports in input order.
    ///
    /// With `continue_on_error` off the first failure is returned and
    /// documents still in flight are abandoned; the store holds only whole
    /// document versions either way.
    pub async fn index_batch(
        &self,
        documents: Vec<DocumentInput>,
        chunking: &ChunkingConfig,
    ) -> Result<(Vec<IndexReport>, BatchResult)> {
        let total_documents = documents.len();
        let mut result = BatchResult {
            total_documents,
            ..BatchResult::default()
        };
        let mut reports = Vec::with_capacity(total_documents);

        info!(total_documents, concurrency = self.config.concurrency, "Starting batch indexing");

        let engine = &self.engine;
        let mut indexed = stream::iter(documents)
            .map(|document| async move {
                let outcome = engine
                    .index_document(
                        &document.document_id,
                        &document.text,
                        chunking.chunk_size,
                        chunking.overlap_size,
                    )
                    .await;
                (document.document_id, outcome)
            })
            .buffered(self.config.concurrency.max(1));

        while let Some((document_id, outcome)) = indexed.next().await {
            match outcome {
                Ok(report) => {
                    result.indexed_documents += 1;
                    result.total_chunks += report.embedded;
                    result.failed_chunks += report.failed.len();
                    reports.push(report);
                }
                Err(e) => {
                    result.failed_documents += 1;

                    if !self.config.continue_on_error {
                        return Err(e);
                    }

                    warn!(document_id = %document_id, error = %e, "Failed to index document");
                    result.errors.push(BatchError {
                        document_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            indexed = result.indexed_documents,
            failed = result.failed_documents,
            chunks = result.total_chunks,
            "Batch indexing complete"
        );

        Ok((reports, result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NoRules;
    use crate::embedding::HashEmbeddingProvider;
    use crate::error::RagError;
    use crate::types::RagConfig;

    fn indexer(continue_on_error: bool) -> BatchIndexer {
        let engine = RagEngine::new(
            RagConfig::default(),
            Arc::new(HashEmbeddingProvider::new(32)),
            Arc::new(NoRules),
        )
        .unwrap();
        BatchIndexer::new(
            Arc::new(engine),
            BatchConfig {
                concurrency: 2,
                continue_on_error,
            },
        )
    }

    fn corpus() -> Vec<DocumentInput> {
        vec![
            DocumentInput::new("egress", "Exit access travel distance shall not exceed 250 feet. ".repeat(10)),
            DocumentInput::new("stairs", "Stair riser heights shall be 7 inches maximum."),
            DocumentInput::new("roofs", "Roof assemblies shall be Class A where required. ".repeat(6)),
        ]
    }

    #[tokio::test]
    async fn test_index_batch_reports_in_order() {
        let indexer = indexer(true);
        let chunking = ChunkingConfig::new(120, 20);
        let (reports, result) = indexer.index_batch(corpus(), &chunking).await.unwrap();

        let ids: Vec<&str> = reports.iter().map(|r| r.document_id.as_str()).collect();
        assert_eq!(ids, vec!["egress", "stairs", "roofs"]);
        assert_eq!(result.total_documents, 3);
        assert_eq!(result.indexed_documents, 3);
        assert_eq!(result.failed_documents, 0);
        assert_eq!(
            result.total_chunks,
            reports.iter().map(|r| r.embedded).sum::<usize>()
        );
        assert_eq!(indexer.engine.store().document_ids().len(), 3);
    }

    #[tokio::test]
    async fn test_continue_on_error_collects_failures() {
        let indexer = indexer(true);
        let chunking = ChunkingConfig::new(50, 50);
        let (reports, result) = indexer.index_batch(corpus(), &chunking).await.unwrap();

        assert!(reports.is_empty());
        assert_eq!(result.failed_documents, 3);
        assert_eq!(result.errors.len(), 3);
        assert_eq!(result.errors[0].document_id, "egress");
    }

    #[tokio::test]
    async fn test_stop_on_first_error() {
        let indexer = indexer(false);
        let chunking = ChunkingConfig::new(50, 60);
        let err = indexer.index_batch(corpus(), &chunking).await.unwrap_err();
        assert!(matches!(err, RagError::Validation(_)));
    }
}
