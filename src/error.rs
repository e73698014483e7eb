//! Error taxonomy for the retrieval engine.

use thiserror::Error;

/// Errors surfaced by the engine.
///
/// Per-chunk embedding failures are not errors; they are reported as
/// [`EmbeddingFailure`](crate::types::EmbeddingFailure) markers. Empty
/// results are plain empty values.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid parameters or a vector of the wrong dimensionality.
    #[error("validation error: {0}")]
    Validation(String),

    /// Every chunk of a document failed to embed; the store was left unchanged.
    #[error("indexing failed for document {document_id}: all {failed} chunk(s) failed to embed")]
    IndexingFailed { document_id: String, failed: usize },

    /// The query text could not be embedded.
    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl RagError {
    /// Whether the caller may reasonably retry the failed operation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RagError::IndexingFailed { .. } | RagError::Embedding(_) | RagError::Timeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
