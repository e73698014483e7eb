//! Chunk type definitions.

use serde::{Deserialize, Serialize};

/// A bounded, offset-addressable slice of a source document.
///
/// Chunks are the fundamental unit of content that gets embedded and indexed.
/// Offsets are character (Unicode scalar) positions in the original text, so
/// `text.chars().count() == end_position - start_position`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// ID of the document this chunk was cut from
    pub document_id: String,

    /// Order of this chunk within its document (0-indexed, contiguous)
    pub chunk_index: usize,

    /// The actual text content of the chunk
    pub text: String,

    /// Starting character index in the original document
    pub start_position: usize,

    /// Ending character index (exclusive) in the original document
    pub end_position: usize,

    /// Section heading in effect where this chunk starts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl DocumentChunk {
    /// Create a new chunk with the given parameters.
    pub fn new(
        document_id: impl Into<String>,
        chunk_index: usize,
        text: String,
        start_position: usize,
        end_position: usize,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            chunk_index,
            text,
            start_position,
            end_position,
            section: None,
        }
    }

    /// Attach the section this chunk belongs to.
    pub fn with_section(mut self, section: Option<String>) -> Self {
        self.section = section;
        self
    }

    /// Length of the chunk in characters.
    pub fn len(&self) -> usize {
        self.end_position - self.start_position
    }

    /// Check if the chunk is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
