//! Base trait for all chunkers.

use crate::error::Result;
use crate::types::{ChunkingConfig, DocumentChunk};

/// The core trait that all chunkers must implement.
///
/// A chunker takes a document's raw text and splits it into bounded,
/// offset-addressable chunks suitable for embedding and retrieval.
pub trait Chunker: Send + Sync {
    /// Get the name of this chunker.
    fn name(&self) -> &'static str;

    /// Chunk the given text with the provided configuration.
    ///
    /// # Arguments
    /// * `document_id` - ID stamped on every produced chunk
    /// * `text` - The raw document text
    /// * `config` - Window size, overlap and boundary tolerance
    ///
    /// # Returns
    /// Chunks ordered by position, with `chunk_index` running `0..n`.
    fn chunk(&self, document_id: &str, text: &str, config: &ChunkingConfig)
        -> Result<Vec<DocumentChunk>>;

    /// Get the description of this chunker.
    fn description(&self) -> &'static str {
        "A text chunker"
    }
}

/// Characters that end a sentence when followed by whitespace.
const SENTENCE_TERMINATORS: [char; 5] = ['.', '!', '?', ';', ':'];

/// Find the preferred end of a window `[start, hard_end)`.
///
/// Looks back at most `tolerance` characters from `hard_end`, but never at or
/// below `min_end`. Paragraph breaks win over line and sentence breaks; if
/// neither is found the hard cut is used.
pub(crate) fn find_break(chars: &[char], hard_end: usize, min_end: usize, tolerance: usize) -> usize {
    let lower = hard_end.saturating_sub(tolerance).max(min_end);
    if lower > hard_end {
        return hard_end;
    }

    // Paragraphs
    for end in (lower..=hard_end).rev() {
        if end >= 2 && chars[end - 1] == '\n' && chars[end - 2] == '\n' {
            return end;
        }
    }

    // Lines and sentences
    for end in (lower..=hard_end).rev() {
        if end == 0 {
            break;
        }
        let last = chars[end - 1];
        if last == '\n' {
            return end;
        }
        if end >= 2 && last.is_whitespace() && SENTENCE_TERMINATORS.contains(&chars[end - 2]) {
            return end;
        }
    }

    hard_end
}
