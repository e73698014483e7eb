//! Vector storage.

mod vector_store;

pub use vector_store::{DocumentInfo, StoreSnapshot, StoreStats, VectorStore};
