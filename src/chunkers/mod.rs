//! Chunking strategies for regulatory documents.

mod base;
mod sections;
mod sliding_window;

pub use base::Chunker;
pub use sections::SectionIndex;
pub use sliding_window::SlidingWindowChunker;
