//! Sliding-window chunker with overlap and boundary preference.

use tracing::debug;

use super::base::{find_break, Chunker};
use super::sections::SectionIndex;
use crate::error::Result;
use crate::types::{ChunkingConfig, DocumentChunk};

/// Chunker that slides a fixed-width window over the text.
///
/// Each window is at most `chunk_size` characters. Where a paragraph, line or
/// sentence break falls within `boundary_tolerance` characters of the hard cut,
/// the window ends there instead. The next window starts exactly
/// `overlap_size` characters before the previous one ended, so dropping the
/// trailing `overlap_size` characters of every chunk but the last and
/// concatenating the rest reproduces the source text.
#[derive(Debug, Default)]
pub struct SlidingWindowChunker;

impl SlidingWindowChunker {
    pub fn new() -> Self {
        Self
    }
}

impl Chunker for SlidingWindowChunker {
    fn name(&self) -> &'static str {
        "sliding_window"
    }

    fn description(&self) -> &'static str {
        "Overlapping fixed-width windows that prefer paragraph and sentence breaks"
    }

    fn chunk(
        &self,
        document_id: &str,
        text: &str,
        config: &ChunkingConfig,
    ) -> Result<Vec<DocumentChunk>> {
        config.validate()?;

        if text.is_empty() {
            return Ok(vec![]);
        }

        // Byte offset of every char, plus the end of the text
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let sections = SectionIndex::build(text, &offsets);

        let make_chunk = |chunk_index: usize, start: usize, end: usize| {
            DocumentChunk::new(
                document_id,
                chunk_index,
                text[offsets[start]..offsets[end]].to_string(),
                start,
                end,
            )
            .with_section(sections.section_for(start, end))
        };

        if total <= config.chunk_size {
            return Ok(vec![make_chunk(0, 0, total)]);
        }

        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            let hard_end = (start + config.chunk_size).min(total);
            let end = if hard_end == total {
                total
            } else {
                // The window must extend past the overlap or we would not advance
                let min_end = start + config.overlap_size + 1;
                find_break(&chars, hard_end, min_end, config.boundary_tolerance)
            };

            chunks.push(make_chunk(chunks.len(), start, end));

            if end == total {
                break;
            }
            start = end - config.overlap_size;
        }

        debug!(
            document_id,
            chunks = chunks.len(),
            chars = total,
            "Chunked document"
        );

        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RagError;
    use pretty_assertions::assert_eq;

    /// Drop the trailing overlap of every chunk but the last and concatenate.
    fn reconstruct(chunks: &[DocumentChunk], overlap: usize) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i + 1 == chunks.len() {
                out.push_str(&chunk.text);
            } else {
                let keep = chunk.text.chars().count() - overlap;
                out.extend(chunk.text.chars().take(keep));
            }
        }
        out
    }

    fn tail(s: &str, n: usize) -> String {
        let count = s.chars().count();
        s.chars().skip(count - n).collect()
    }

    fn head(s: &str, n: usize) -> String {
        s.chars().take(n).collect()
    }

    #[test]
    fn test_small_text_is_single_chunk() {
        let chunker = SlidingWindowChunker::new();
        let chunks = chunker
            .chunk("doc", "Hello, world!", &ChunkingConfig::new(100, 10))
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].start_position, 0);
        assert_eq!(chunks[0].end_position, 13);
    }

    #[test]
    fn test_empty_text() {
        let chunker = SlidingWindowChunker::new();
        let chunks = chunker.chunk("doc", "", &ChunkingConfig::new(100, 10)).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_invalid_overlap_rejected() {
        let chunker = SlidingWindowChunker::new();
        let err = chunker
            .chunk("doc", "text", &ChunkingConfig::new(10, 10))
            .unwrap_err();
        assert!(matches!(err, RagError::Validation(_)));

        let err = chunker.chunk("doc", "text", &ChunkingConfig::new(0, 0)).unwrap_err();
        assert!(matches!(err, RagError::Validation(_)));
    }

    #[test]
    fn test_repeated_sentences_overlap() {
        let chunker = SlidingWindowChunker::new();
        let sentence = "Exit doors shall swing in the direction of egress travel. ";
        let mut text = sentence.repeat(2500 / sentence.len() + 1);
        text.truncate(2500);
        let config = ChunkingConfig::new(500, 50);

        let chunks = chunker.chunk("ibc", &text, &config).unwrap();

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 500);
            assert!(chunk.start_position < chunk.end_position);
        }
        for pair in chunks.windows(2) {
            assert_eq!(tail(&pair[0].text, 50), head(&pair[1].text, 50));
            assert_eq!(pair[1].start_position, pair[0].end_position - 50);
        }
        assert_eq!(reconstruct(&chunks, 50), text);
    }

    #[test]
    fn test_chunk_indices_are_contiguous() {
        let chunker = SlidingWindowChunker::new();
        let text = "word ".repeat(400);
        let chunks = chunker.chunk("doc", &text, &ChunkingConfig::new(64, 16)).unwrap();
        let indices: Vec<usize> = chunks.iter().map(|c| c.chunk_index).collect();
        let expected: Vec<usize> = (0..chunks.len()).collect();
        assert_eq!(indices, expected);
        assert_eq!(chunks.last().unwrap().end_position, text.chars().count());
    }

    #[test]
    fn test_reconstruction_across_parameters() {
        let chunker = SlidingWindowChunker::new();
        let text = "Section 1004 Occupant Load\n\nThe number of occupants shall be computed. \
                    Areas without fixed seating use the gross floor area!\nStairs: 1100 mm min.\n\n\
                    § 1005 Egress width. Widths are in millimetres; never below 900."
            .repeat(7);

        for (size, overlap, tolerance) in [(40, 0, 0), (40, 5, 10), (73, 30, 20), (120, 119, 50), (9, 1, 8)] {
            let config = ChunkingConfig::new(size, overlap).with_tolerance(tolerance);
            let chunks = chunker.chunk("doc", &text, &config).unwrap();
            for chunk in &chunks {
                assert!(chunk.text.chars().count() <= size);
                assert_eq!(chunk.len(), chunk.text.chars().count());
            }
            assert_eq!(reconstruct(&chunks, overlap), text, "size={size} overlap={overlap}");
        }
    }

    #[test]
    fn test_multibyte_text() {
        let chunker = SlidingWindowChunker::new();
        let text = "Größe über Maß. Ångström çà. ".repeat(20);
        let chunks = chunker.chunk("doc", &text, &ChunkingConfig::new(25, 4)).unwrap();
        assert!(chunks.len() > 1);
        assert_eq!(reconstruct(&chunks, 4), text);
    }

    #[test]
    fn test_prefers_sentence_boundary() {
        let chunker = SlidingWindowChunker::new();
        let text = "Short one. Then a much longer sentence follows here without stopping";
        let config = ChunkingConfig::new(20, 0).with_tolerance(15);
        let chunks = chunker.chunk("doc", text, &config).unwrap();
        assert_eq!(chunks[0].text, "Short one. ");
    }

    #[test]
    fn test_sections_attached() {
        let chunker = SlidingWindowChunker::new();
        let text = format!(
            "Section 1011.5 Stair treads\n{}\nSection 1011.6 Landings\n{}",
            "Riser height shall be 7 inches maximum. ".repeat(5),
            "Landings shall be as wide as the stair. ".repeat(5)
        );
        let chunks = chunker.chunk("ibc", &text, &ChunkingConfig::new(120, 10)).unwrap();
        assert_eq!(chunks[0].section.as_deref(), Some("1011.5"));
        assert_eq!(chunks.last().unwrap().section.as_deref(), Some("1011.6"));
    }
}
