use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ApiError;

/// A stored chunk with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChunk {
    /// Unique chunk identifier, `"{source}_{chunk_index}"`.
    pub chunk_id: String,
    /// The text content of the chunk.
    pub content: String,
    /// Source identifier (filename or document id).
    pub source: String,
    /// Collection that owns this chunk.
    pub collection: String,
    /// Optional metadata (JSON).
    pub metadata: Option<serde_json::Value>,
}

/// Result of a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: StoredChunk,
    /// Cosine similarity (higher = better).
    pub score: f32,
}

/// Abstract interface over the chunk store.
///
/// Collections are created lazily on first write; writing to the same chunk
/// id overwrites rather than duplicates.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert a chunk with its embedding vector.
    async fn insert(&self, chunk: StoredChunk, embedding: Vec<f32>) -> Result<(), ApiError>;

    /// Insert multiple chunks in one transaction.
    async fn insert_batch(&self, items: Vec<(StoredChunk, Vec<f32>)>) -> Result<(), ApiError>;

    /// Search one collection for chunks similar to the query embedding,
    /// best score first. Returns at most `limit` results; an empty
    /// collection or a zero limit yields an empty result.
    async fn search(
        &self,
        collection: &str,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, ApiError>;

    /// Whether any chunk has ever been written to `collection`.
    async fn collection_exists(&self, collection: &str) -> Result<bool, ApiError>;

    /// All collection names, sorted.
    async fn list_collections(&self) -> Result<Vec<String>, ApiError>;

    /// Chunks in `collection` whose metadata `key` equals `value`, ordered
    /// by chunk id. Linear scan of the collection, O(n), not a key lookup.
    async fn find_by_metadata(
        &self,
        collection: &str,
        key: &str,
        value: &str,
    ) -> Result<Vec<StoredChunk>, ApiError>;

    /// Total chunk count (optionally scoped to one collection).
    async fn count(&self, collection: Option<&str>) -> Result<usize, ApiError>;
}
