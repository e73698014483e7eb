//! Embedding vectors and per-chunk embedding outcomes.

use serde::{Deserialize, Serialize};

use super::DocumentChunk;

/// A chunk's text together with its embedding and provenance.
///
/// Owned by the [`VectorStore`](crate::store::VectorStore) once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingVector {
    pub document_id: String,
    pub chunk_index: usize,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub vector: Vec<f32>,
}

impl EmbeddingVector {
    /// Pair a chunk with the vector computed for it.
    pub fn from_chunk(chunk: DocumentChunk, vector: Vec<f32>) -> Self {
        Self {
            document_id: chunk.document_id,
            chunk_index: chunk.chunk_index,
            text: chunk.text,
            section: chunk.section,
            vector,
        }
    }

    /// Dimensionality of the vector.
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// Marker for a chunk whose embedding could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingFailure {
    /// Provider attempts made before giving up
    pub attempts: u32,
    /// Last error reported by the provider
    pub message: String,
}

impl std::fmt::Display for EmbeddingFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "embedding failed after {} attempt(s): {}", self.attempts, self.message)
    }
}

/// Result of embedding one chunk, in the same position as the input chunk.
#[derive(Debug, Clone)]
pub struct EmbeddingOutcome {
    pub chunk: DocumentChunk,
    pub result: Result<Vec<f32>, EmbeddingFailure>,
}

impl EmbeddingOutcome {
    /// Whether this chunk received a vector.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Convert into a storable embedding, or hand back the failed chunk.
    pub fn into_embedding(self) -> Result<EmbeddingVector, (DocumentChunk, EmbeddingFailure)> {
        match self.result {
            Ok(vector) => Ok(EmbeddingVector::from_chunk(self.chunk, vector)),
            Err(failure) => Err((self.chunk, failure)),
        }
    }
}
