//! SQLite-backed vector store.
//!
//! In-process store using SQLite for chunk rows and brute-force cosine
//! similarity for search. Embeddings are stored as little-endian f32 blobs.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::store::{ScoredChunk, StoredChunk, VectorStore};
use crate::config::AppPaths;
use crate::errors::ApiError;

pub struct SqliteVectorStore {
    pool: SqlitePool,
    #[allow(dead_code)]
    db_path: PathBuf,
}

impl SqliteVectorStore {
    pub async fn new(paths: &AppPaths) -> Result<Self, ApiError> {
        Self::with_path(paths.db_path.clone()).await
    }

    pub async fn with_path(db_path: PathBuf) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        let store = Self { pool, db_path };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chunks (
                chunk_id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                source TEXT NOT NULL DEFAULT '',
                collection TEXT NOT NULL DEFAULT '',
                metadata TEXT DEFAULT '{}',
                embedding BLOB,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_collection ON chunks(collection)")
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        let denom = norm_a * norm_b;

        if denom <= f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }

    fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> StoredChunk {
        let metadata_str: String = row.get("metadata");
        let metadata = serde_json::from_str::<Value>(&metadata_str).ok();

        StoredChunk {
            chunk_id: row.get("chunk_id"),
            content: row.get("content"),
            source: row.get("source"),
            collection: row.get("collection"),
            metadata,
        }
    }

    async fn insert_one(
        executor: &mut sqlx::SqliteConnection,
        chunk: &StoredChunk,
        embedding: &[f32],
    ) -> Result<(), ApiError> {
        let blob = Self::serialize_embedding(embedding);
        let metadata_str = chunk
            .metadata
            .as_ref()
            .map(|m| serde_json::to_string(m).unwrap_or_default())
            .unwrap_or_else(|| "{}".to_string());

        sqlx::query(
            "INSERT OR REPLACE INTO chunks (chunk_id, content, source, collection, metadata, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&chunk.chunk_id)
        .bind(&chunk.content)
        .bind(&chunk.source)
        .bind(&chunk.collection)
        .bind(&metadata_str)
        .bind(&blob)
        .execute(executor)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn insert(&self, chunk: StoredChunk, embedding: Vec<f32>) -> Result<(), ApiError> {
        let mut conn = self.pool.acquire().await.map_err(ApiError::internal)?;
        Self::insert_one(&mut *conn, &chunk, &embedding).await
    }

    async fn insert_batch(&self, items: Vec<(StoredChunk, Vec<f32>)>) -> Result<(), ApiError> {
        if items.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;
        for (chunk, embedding) in &items {
            Self::insert_one(&mut *tx, chunk, embedding).await?;
        }
        tx.commit().await.map_err(ApiError::internal)?;
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, ApiError> {
        let rows = sqlx::query(
            "SELECT chunk_id, content, source, collection, metadata, embedding
             FROM chunks
             WHERE collection = ?1",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        let mut scored: Vec<ScoredChunk> = rows
            .iter()
            .filter_map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                if embedding_bytes.is_empty() {
                    return None;
                }
                let stored_emb = Self::deserialize_embedding(&embedding_bytes);
                let score = Self::cosine_similarity(query_embedding, &stored_emb);

                Some(ScoredChunk {
                    chunk: Self::row_to_chunk(row),
                    score,
                })
            })
            .collect();

        // Stable ordering under equal scores: fall back to chunk id so
        // repeated searches return the same sequence.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk.chunk_id.cmp(&b.chunk.chunk_id))
        });
        scored.truncate(limit);

        Ok(scored)
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool, ApiError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE collection = ?1 LIMIT 1")
                .bind(collection)
                .fetch_one(&self.pool)
                .await
                .map_err(ApiError::internal)?;
        Ok(count > 0)
    }

    async fn list_collections(&self) -> Result<Vec<String>, ApiError> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT collection FROM chunks ORDER BY collection",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;
        Ok(rows)
    }

    async fn find_by_metadata(
        &self,
        collection: &str,
        key: &str,
        value: &str,
    ) -> Result<Vec<StoredChunk>, ApiError> {
        let rows = sqlx::query(
            "SELECT chunk_id, content, source, collection, metadata, embedding
             FROM chunks
             WHERE collection = ?1
             ORDER BY chunk_id",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        let matches = rows
            .iter()
            .map(Self::row_to_chunk)
            .filter(|chunk| {
                chunk
                    .metadata
                    .as_ref()
                    .and_then(|m| m.get(key))
                    .and_then(|v| v.as_str())
                    .is_some_and(|v| v == value)
            })
            .collect();

        Ok(matches)
    }

    async fn count(&self, collection: Option<&str>) -> Result<usize, ApiError> {
        let count: i64 = if let Some(collection) = collection {
            sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE collection = ?1")
                .bind(collection)
                .fetch_one(&self.pool)
                .await
                .map_err(ApiError::internal)?
        } else {
            sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
                .fetch_one(&self.pool)
                .await
                .map_err(ApiError::internal)?
        };

        Ok(count as usize)
    }
}
