//! In-memory vector store with atomic per-document replacement.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{RagError, Result};
use crate::types::EmbeddingVector;

/// One indexed version of a document.
#[derive(Debug, Clone)]
struct StoredDocument {
    version: u64,
    indexed_at: DateTime<Utc>,
    embeddings: Arc<[EmbeddingVector]>,
}

#[derive(Debug, Default)]
struct StoreState {
    documents: HashMap<String, StoredDocument>,
    /// Fixed by the first add on an empty store
    dimension: Option<usize>,
}

/// Public view of a stored document's version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentInfo {
    pub document_id: String,
    pub version: u64,
    pub indexed_at: DateTime<Utc>,
    pub chunks: usize,
}

/// Store counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub documents: usize,
    pub vectors: usize,
    pub dimension: Option<usize>,
}

/// Holds chunk text, vector and provenance, keyed by document.
///
/// Each document's embeddings live in one immutable `Arc<[EmbeddingVector]>`.
/// Writers build the replacement set outside the lock and swap the `Arc`
/// under a short write lock, so readers see either the old or the new set of
/// a document, never a mixture or a partial set.
#[derive(Debug, Default)]
pub struct VectorStore {
    state: RwLock<StoreState>,
}

/// Point-in-time view of every stored document, for similarity scans.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    documents: Vec<Arc<[EmbeddingVector]>>,
    dimension: Option<usize>,
}

impl StoreSnapshot {
    pub fn iter(&self) -> impl Iterator<Item = &EmbeddingVector> {
        self.documents.iter().flat_map(|doc| doc.iter())
    }

    pub fn len(&self) -> usize {
        self.documents.iter().map(|doc| doc.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.iter().all(|doc| doc.is_empty())
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }
}

impl VectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install `embeddings` as the complete set for `document_id`, replacing
    /// any previous set in one step. Returns the new version number.
    pub fn add(&self, document_id: &str, mut embeddings: Vec<EmbeddingVector>) -> Result<u64> {
        let dimension = Self::validate_set(document_id, &mut embeddings)?;
        let staged: Arc<[EmbeddingVector]> = embeddings.into();
        let chunks = staged.len();

        let version = {
            let mut state = self.write();
            if let Some(expected) = state.dimension {
                if expected != dimension {
                    drop(state);
                    warn!(
                        document_id,
                        expected, actual = dimension, "Rejected embeddings with wrong dimensionality"
                    );
                    return Err(RagError::Validation(format!(
                        "vector dimensionality {dimension} does not match store dimensionality {expected}"
                    )));
                }
            }
            state.dimension = Some(dimension);

            let version = state
                .documents
                .get(document_id)
                .map_or(1, |previous| previous.version + 1);
            state.documents.insert(
                document_id.to_string(),
                StoredDocument {
                    version,
                    indexed_at: Utc::now(),
                    embeddings: staged,
                },
            );
            version
        };

        info!(document_id, version, chunks, "Installed document embeddings");
        Ok(version)
    }

    /// Check a set is non-empty, belongs to one document, has unique chunk
    /// indices and one dimensionality. Sorts it by chunk index.
    fn validate_set(document_id: &str, embeddings: &mut [EmbeddingVector]) -> Result<usize> {
        let first = embeddings.first().ok_or_else(|| {
            RagError::Validation(format!("empty embedding set for document {document_id}"))
        })?;
        let dimension = first.dimension();
        if dimension == 0 {
            return Err(RagError::Validation("vectors must not be empty".into()));
        }

        for embedding in embeddings.iter() {
            if embedding.document_id != document_id {
                return Err(RagError::Validation(format!(
                    "embedding for document {} in set for document {}",
                    embedding.document_id, document_id
                )));
            }
            if embedding.dimension() != dimension {
                return Err(RagError::Validation(format!(
                    "mixed dimensionality in set: {} and {}",
                    dimension,
                    embedding.dimension()
                )));
            }
        }

        embeddings.sort_by_key(|e| e.chunk_index);
        if embeddings.windows(2).any(|w| w[0].chunk_index == w[1].chunk_index) {
            return Err(RagError::Validation(format!(
                "duplicate chunk index in set for document {document_id}"
            )));
        }

        Ok(dimension)
    }

    /// Embeddings of one document in chunk order; empty if absent.
    pub fn get(&self, document_id: &str) -> Vec<EmbeddingVector> {
        self.get_shared(document_id)
            .map(|set| set.to_vec())
            .unwrap_or_default()
    }

    /// Shared handle to one document's embeddings.
    pub fn get_shared(&self, document_id: &str) -> Option<Arc<[EmbeddingVector]>> {
        self.read()
            .documents
            .get(document_id)
            .map(|doc| Arc::clone(&doc.embeddings))
    }

    /// Every stored embedding, ordered by document ID then chunk index.
    pub fn all(&self) -> Vec<EmbeddingVector> {
        let state = self.read();
        let mut ids: Vec<&String> = state.documents.keys().collect();
        ids.sort();
        ids.into_iter()
            .flat_map(|id| state.documents[id].embeddings.iter().cloned())
            .collect()
    }

    /// Cheap snapshot for scanning; holds `Arc`s, not copies.
    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.read();
        StoreSnapshot {
            documents: state
                .documents
                .values()
                .map(|doc| Arc::clone(&doc.embeddings))
                .collect(),
            dimension: state.dimension,
        }
    }

    /// Remove a document. Returns whether it was present.
    pub fn remove(&self, document_id: &str) -> bool {
        let mut state = self.write();
        let removed = state.documents.remove(document_id).is_some();
        if state.documents.is_empty() {
            state.dimension = None;
        }
        drop(state);

        if removed {
            debug!(document_id, "Removed document embeddings");
        }
        removed
    }

    pub fn version(&self, document_id: &str) -> Option<u64> {
        self.read().documents.get(document_id).map(|doc| doc.version)
    }

    pub fn document_info(&self, document_id: &str) -> Option<DocumentInfo> {
        self.read().documents.get(document_id).map(|doc| DocumentInfo {
            document_id: document_id.to_string(),
            version: doc.version,
            indexed_at: doc.indexed_at,
            chunks: doc.embeddings.len(),
        })
    }

    /// Stored document IDs, sorted.
    pub fn document_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read().documents.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn dimension(&self) -> Option<usize> {
        self.read().dimension
    }

    pub fn is_empty(&self) -> bool {
        self.read().documents.is_empty()
    }

    pub fn stats(&self) -> StoreStats {
        let state = self.read();
        StoreStats {
            documents: state.documents.len(),
            vectors: state.documents.values().map(|doc| doc.embeddings.len()).sum(),
            dimension: state.dimension,
        }
    }
}
