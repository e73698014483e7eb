//! Exact top-k retrieval by cosine similarity.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tokio_util::sync::CancellationToken;

use super::similarity::cosine_similarity;
use crate::error::{RagError, Result};
use crate::types::{EmbeddingVector, RetrievedChunk};

/// How many candidates are scored between cancellation checks.
const CANCEL_CHECK_INTERVAL: usize = 1024;

/// Ranks stored vectors against a query vector.
///
/// Linear scan, O(candidates × dimension), keeping the best `max_results` in a
/// bounded heap. Equal scores are ordered by ascending document ID, then
/// ascending chunk index, so identical inputs always produce identical output.
#[derive(Debug, Clone, Copy, Default)]
pub struct Retriever;

struct Candidate<'a> {
    score: f32,
    embedding: &'a EmbeddingVector,
}

impl Ord for Candidate<'_> {
    /// `Less` means "ranks ahead of".
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.embedding.document_id.cmp(&other.embedding.document_id))
            .then_with(|| self.embedding.chunk_index.cmp(&other.embedding.chunk_index))
    }
}

impl PartialOrd for Candidate<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate<'_> {}

impl Retriever {
    pub fn new() -> Self {
        Self
    }

    /// Return the `max_results` best-scoring candidates, best first.
    pub fn search<'a, I>(&self, query: &[f32], candidates: I, max_results: usize) -> Vec<RetrievedChunk>
    where
        I: IntoIterator<Item = &'a EmbeddingVector>,
    {
        // A fresh token is never cancelled
        self.search_cancellable(query, candidates, max_results, &CancellationToken::new())
            .unwrap_or_default()
    }

    /// [`search`](Self::search) that gives up with [`RagError::Cancelled`]
    /// once `cancel` fires.
    pub fn search_cancellable<'a, I>(
        &self,
        query: &[f32],
        candidates: I,
        max_results: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<RetrievedChunk>>
    where
        I: IntoIterator<Item = &'a EmbeddingVector>,
    {
        if max_results == 0 {
            return Ok(vec![]);
        }

        let candidates = candidates.into_iter();
        let (expected, _) = candidates.size_hint();
        let mut heap: BinaryHeap<Candidate<'a>> =
            BinaryHeap::with_capacity(max_results.min(expected).saturating_add(1));

        for (scanned, embedding) in candidates.enumerate() {
            if scanned % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                return Err(RagError::Cancelled);
            }

            heap.push(Candidate {
                score: cosine_similarity(query, &embedding.vector),
                embedding,
            });
            if heap.len() > max_results {
                // Drops the worst-ranked candidate
                heap.pop();
            }
        }

        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|c| RetrievedChunk::from_embedding(c.embedding, c.score))
            .collect())
    }
}
