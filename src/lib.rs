//! Regulatory Retrieval Library
//!
//! Retrieval-augmented context for building-layout generation: regulatory
//! documents are chunked, embedded and stored, then the most relevant chunks
//! and their extracted building rules are folded into generation prompts.

pub mod batch;
pub mod chunkers;
pub mod context;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod prompt;
pub mod retrieval;
pub mod store;
pub mod types;

pub use batch::{BatchConfig, BatchIndexer, BatchResult, DocumentInput};
pub use chunkers::{Chunker, SlidingWindowChunker};
pub use context::{ContextAssembler, InMemoryRuleProvider, NoRules, RuleProvider};
pub use embedding::{Embedder, EmbeddingProvider, HashEmbeddingProvider, HttpEmbeddingProvider};
pub use engine::{IndexReport, RagEngine};
pub use error::{RagError, Result};
pub use prompt::PromptAugmenter;
pub use retrieval::Retriever;
pub use store::VectorStore;
pub use types::{BuildingRule, DocumentChunk, EmbeddingVector, RagConfig, RagContext, RetrievedChunk};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::batch::*;
    pub use crate::chunkers::{Chunker, SlidingWindowChunker};
    pub use crate::context::{InMemoryRuleProvider, NoRules, RuleProvider};
    pub use crate::embedding::{EmbeddingProvider, HashEmbeddingProvider, HttpEmbeddingProvider};
    pub use crate::engine::{IndexReport, RagEngine};
    pub use crate::error::{RagError, Result};
    pub use crate::types::*;
}

/// Default chunk size in characters
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default chunk overlap in characters
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// How far before the hard cut a chunk may end to land on a natural boundary
pub const DEFAULT_BOUNDARY_TOLERANCE: usize = 100;

/// Default texts per embedding provider call
pub const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 32;

/// Default number of chunks retrieved per query
pub const DEFAULT_MAX_CHUNKS: usize = 5;

/// Default characters of context appended to a prompt
pub const DEFAULT_MAX_CONTEXT_LENGTH: usize = 4000;
