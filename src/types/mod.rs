//! Core types for the retrieval engine.

mod chunk;
mod config;
mod context;
mod embedding;
mod rule;

pub use chunk::DocumentChunk;
pub use config::{ChunkingConfig, EmbedderConfig, PromptConfig, RagConfig, RetrievalConfig};
pub use context::{RagContext, RetrievedChunk};
pub use embedding::{EmbeddingFailure, EmbeddingOutcome, EmbeddingVector};
pub use rule::BuildingRule;
