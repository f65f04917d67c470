//! Vector storage.
//!
//! `VectorStore` abstracts the backing store for embedded chunks; the
//! shipped implementation is `SqliteVectorStore`. Relevance scores are
//! cosine similarity, higher is better, crate-wide.

mod sqlite;
mod store;

pub use sqlite::SqliteVectorStore;
pub use store::{ScoredChunk, StoredChunk, VectorStore};
