//! Similarity retrieval.

mod retriever;
mod similarity;

pub use retriever::Retriever;
pub use similarity::{cosine_similarity, dot_product, magnitude};
