//! Retrieval results and the assembled RAG context.

use serde::{Deserialize, Serialize};

use super::{BuildingRule, EmbeddingVector};

/// A stored chunk returned by similarity search, with its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub document_id: String,
    pub chunk_index: usize,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Cosine similarity to the query, in [-1, 1]
    pub similarity_score: f32,
}

impl RetrievedChunk {
    pub fn from_embedding(embedding: &EmbeddingVector, similarity_score: f32) -> Self {
        Self {
            document_id: embedding.document_id.clone(),
            chunk_index: embedding.chunk_index,
            text: embedding.text.clone(),
            section: embedding.section.clone(),
            similarity_score,
        }
    }

    /// Provenance tag used when the chunk is rendered into a prompt.
    pub fn provenance(&self) -> String {
        match &self.section {
            Some(section) => format!("{} §{} #{}", self.document_id, section, self.chunk_index),
            None => format!("{} #{}", self.document_id, self.chunk_index),
        }
    }
}

/// The bounded, ranked bundle of retrieved text and structured facts for one query.
///
/// Built fresh per query by the [`ContextAssembler`](crate::context::ContextAssembler)
/// and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagContext {
    pub query: String,
    /// Highest relevance first; never longer than `max_chunks`
    pub relevant_chunks: Vec<RetrievedChunk>,
    pub building_rules: Vec<BuildingRule>,
    /// Best similarity among `relevant_chunks`, clipped to [0, 1]
    pub confidence_score: f32,
    pub max_chunks: usize,
}

impl RagContext {
    /// A context with no retrieved evidence.
    pub fn empty(query: impl Into<String>, max_chunks: usize) -> Self {
        Self {
            query: query.into(),
            relevant_chunks: Vec::new(),
            building_rules: Vec::new(),
            confidence_score: 0.0,
            max_chunks,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.relevant_chunks.is_empty()
    }
}
