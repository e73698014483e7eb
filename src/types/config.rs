//! Configuration types for the retrieval engine.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RagError;
use crate::{
    DEFAULT_BOUNDARY_TOLERANCE, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE,
    DEFAULT_EMBEDDING_BATCH_SIZE, DEFAULT_MAX_CHUNKS, DEFAULT_MAX_CONTEXT_LENGTH,
};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub chunking: ChunkingConfig,
    pub embedder: EmbedderConfig,
    pub retrieval: RetrievalConfig,
    pub prompt: PromptConfig,
}

/// Parameters for splitting documents into chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window width in characters
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    pub overlap_size: usize,

    /// How far back from the hard cut a paragraph or sentence break may be taken
    pub boundary_tolerance: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap_size: DEFAULT_CHUNK_OVERLAP,
            boundary_tolerance: DEFAULT_BOUNDARY_TOLERANCE,
        }
    }
}

impl ChunkingConfig {
    /// Create a config with the given chunk size and overlap.
    pub fn new(chunk_size: usize, overlap_size: usize) -> Self {
        Self {
            chunk_size,
            overlap_size,
            ..Default::default()
        }
    }

    /// Set the boundary tolerance.
    pub fn with_tolerance(mut self, tolerance: usize) -> Self {
        self.boundary_tolerance = tolerance;
        self
    }

    pub fn validate(&self) -> Result<(), RagError> {
        if self.overlap_size >= self.chunk_size {
            return Err(RagError::Validation(format!(
                "overlap_size ({}) must be smaller than chunk_size ({})",
                self.overlap_size, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Batching, concurrency and retry settings for embedding calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedderConfig {
    /// Maximum texts per provider call
    pub max_batch_size: usize,

    /// Provider calls in flight at once
    pub max_concurrency: usize,

    /// Attempts per call before a chunk is marked failed
    pub max_attempts: u32,

    /// First retry delay; doubles on every further attempt
    pub base_backoff_ms: u64,

    /// Upper bound on a single retry delay
    pub max_backoff_ms: u64,

    /// Timeout for a single provider call
    pub request_timeout_secs: u64,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_EMBEDDING_BATCH_SIZE,
            max_concurrency: 4,
            max_attempts: 3,
            base_backoff_ms: 200,
            max_backoff_ms: 5_000,
            request_timeout_secs: 30,
        }
    }
}

impl EmbedderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), RagError> {
        if self.max_batch_size == 0 {
            return Err(RagError::Validation("max_batch_size must be positive".into()));
        }
        if self.max_concurrency == 0 {
            return Err(RagError::Validation("max_concurrency must be positive".into()));
        }
        if self.max_attempts == 0 {
            return Err(RagError::Validation("max_attempts must be positive".into()));
        }
        Ok(())
    }
}

/// Similarity search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Chunks returned when the caller does not ask for a specific number
    pub default_max_chunks: usize,

    /// Deadline for a single similarity scan
    pub search_timeout_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_max_chunks: DEFAULT_MAX_CHUNKS,
            search_timeout_ms: 5_000,
        }
    }
}

impl RetrievalConfig {
    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }
}

/// Prompt augmentation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Characters of retrieved context appended to a prompt
    pub max_context_length: usize,

    /// Rules extracted with lower confidence are not joined into contexts
    pub min_rule_confidence: f32,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_context_length: DEFAULT_MAX_CONTEXT_LENGTH,
            min_rule_confidence: 0.0,
        }
    }
}

impl RagConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            chunking: ChunkingConfig {
                chunk_size: env_or("RAG_CHUNK_SIZE", defaults.chunking.chunk_size),
                overlap_size: env_or("RAG_CHUNK_OVERLAP", defaults.chunking.overlap_size),
                boundary_tolerance: env_or(
                    "RAG_BOUNDARY_TOLERANCE",
                    defaults.chunking.boundary_tolerance,
                ),
            },
            embedder: EmbedderConfig {
                max_batch_size: env_or("RAG_EMBED_BATCH_SIZE", defaults.embedder.max_batch_size),
                max_concurrency: env_or("RAG_EMBED_CONCURRENCY", defaults.embedder.max_concurrency),
                max_attempts: env_or("RAG_EMBED_MAX_ATTEMPTS", defaults.embedder.max_attempts),
                base_backoff_ms: env_or("RAG_EMBED_BACKOFF_MS", defaults.embedder.base_backoff_ms),
                max_backoff_ms: env_or("RAG_EMBED_MAX_BACKOFF_MS", defaults.embedder.max_backoff_ms),
                request_timeout_secs: env_or(
                    "RAG_EMBED_TIMEOUT_SECS",
                    defaults.embedder.request_timeout_secs,
                ),
            },
            retrieval: RetrievalConfig {
                default_max_chunks: env_or("RAG_MAX_CHUNKS", defaults.retrieval.default_max_chunks),
                search_timeout_ms: env_or(
                    "RAG_SEARCH_TIMEOUT_MS",
                    defaults.retrieval.search_timeout_ms,
                ),
            },
            prompt: PromptConfig {
                max_context_length: env_or(
                    "RAG_MAX_CONTEXT_LENGTH",
                    defaults.prompt.max_context_length,
                ),
                min_rule_confidence: env_or(
                    "RAG_MIN_RULE_CONFIDENCE",
                    defaults.prompt.min_rule_confidence,
                ),
            },
        }
    }

    /// Load configuration from an optional file, overridden by `RAG__`-prefixed
    /// environment variables (e.g. `RAG__CHUNKING__CHUNK_SIZE=800`).
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix("RAG").prefix_separator("__").separator("__"))
            .build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject option combinations the engine cannot run with.
    pub fn validate(&self) -> Result<(), RagError> {
        self.chunking.validate()?;
        self.embedder.validate()?;
        if !(0.0..=1.0).contains(&self.prompt.min_rule_confidence) {
            return Err(RagError::Validation(format!(
                "min_rule_confidence ({}) must be within [0, 1]",
                self.prompt.min_rule_confidence
            )));
        }
        Ok(())
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
