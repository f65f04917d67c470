//! Document ingestion.
//!
//! Two entry points share the split/embed/store flow:
//! - `ingest_dir` loads whole files from a source directory, one collection
//!   per file (`"{stem}_docs"`), skipping unreadable files.
//! - `add_text` accepts an ad-hoc text blob and writes it into the shared
//!   collection with a generated document id.
//!
//! Chunk ids are `"{source}_{chunk_index}"`, so re-ingesting the same
//! source overwrites instead of duplicating.

use std::path::Path;

use chrono::Utc;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::chunker::Chunker;
use crate::errors::ApiError;
use crate::llm::Embedder;
use crate::store::{StoredChunk, VectorStore};

/// Collection used by the HTTP variant.
pub const SHARED_COLLECTION: &str = "knowledge_base";

/// Collection name for a source file topic.
pub fn collection_for_source(source: &str) -> String {
    format!("{}_docs", source)
}

/// Topic collection names for every regular file in `dir`, sorted. This is
/// the retriever's registry when a source directory is configured.
pub fn topic_collections(dir: &Path) -> Result<Vec<String>, ApiError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| ApiError::BadRequest(format!("cannot read {}: {}", dir.display(), e)))?;

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter_map(|path| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .map(collection_for_source)
        })
        .collect();
    names.sort();
    names.dedup();
    Ok(names)
}

#[derive(Debug, Default, Clone)]
pub struct IngestReport {
    pub files_ingested: usize,
    pub files_skipped: usize,
    pub chunks_written: usize,
}

#[derive(Debug, Clone)]
pub struct AddedDocument {
    pub document_id: String,
    pub document_size: usize,
    pub chunks_created: usize,
    pub metadata: Value,
}

pub struct Ingestor {
    chunker: Chunker,
}

impl Ingestor {
    pub fn new(chunker: Chunker) -> Self {
        Self { chunker }
    }

    /// Ingests every regular file in `dir`, one topic collection per file.
    /// Per-file failures are logged and skipped; the batch continues.
    pub async fn ingest_dir(
        &self,
        dir: &Path,
        store: &dyn VectorStore,
        embedder: &dyn Embedder,
    ) -> Result<IngestReport, ApiError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| ApiError::BadRequest(format!("cannot read {}: {}", dir.display(), e)))?;

        let mut paths: Vec<_> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        let mut report = IngestReport::default();
        for path in paths {
            match self.ingest_file(&path, store, embedder).await {
                Ok(written) => {
                    report.files_ingested += 1;
                    report.chunks_written += written;
                }
                Err(err) => {
                    tracing::warn!("skipping {}: {}", path.display(), err);
                    report.files_skipped += 1;
                }
            }
        }

        tracing::info!(
            "ingested {} file(s), skipped {}, wrote {} chunk(s)",
            report.files_ingested,
            report.files_skipped,
            report.chunks_written
        );
        Ok(report)
    }

    /// Ingests one file into its topic collection. Returns the chunk count.
    pub async fn ingest_file(
        &self,
        path: &Path,
        store: &dyn VectorStore,
        embedder: &dyn Embedder,
    ) -> Result<usize, ApiError> {
        let source = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ApiError::BadRequest(format!("unusable file name: {}", path.display())))?
            .to_string();

        let text = std::fs::read_to_string(path)
            .map_err(|e| ApiError::BadRequest(format!("unreadable file: {}", e)))?;

        let collection = collection_for_source(&source);
        let added_at = Utc::now().to_rfc3339();

        self.write_chunks(&text, &source, &collection, json!({ "added_at": added_at }), store, embedder)
            .await
    }

    /// Chunks and stores an ad-hoc text blob into the shared collection.
    /// Caller metadata is merged with the generated `document_id` and
    /// `added_at` timestamp.
    pub async fn add_text(
        &self,
        content: &str,
        metadata: Option<Value>,
        store: &dyn VectorStore,
        embedder: &dyn Embedder,
    ) -> Result<AddedDocument, ApiError> {
        let document_id = Uuid::new_v4().to_string();

        let mut merged = match metadata {
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(ApiError::BadRequest(format!(
                    "metadata must be a JSON object, got {}",
                    other
                )))
            }
            None => Map::new(),
        };
        merged.insert("document_id".to_string(), json!(document_id));
        merged.insert("added_at".to_string(), json!(Utc::now().to_rfc3339()));
        let merged = Value::Object(merged);

        let chunks_created = self
            .write_chunks(
                content,
                &document_id,
                SHARED_COLLECTION,
                merged.clone(),
                store,
                embedder,
            )
            .await?;

        Ok(AddedDocument {
            document_id,
            document_size: content.chars().count(),
            chunks_created,
            metadata: merged,
        })
    }

    async fn write_chunks(
        &self,
        text: &str,
        source: &str,
        collection: &str,
        base_metadata: Value,
        store: &dyn VectorStore,
        embedder: &dyn Embedder,
    ) -> Result<usize, ApiError> {
        let chunks = self.chunker.split(text, source);
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = embedder.embed(&texts).await?;

        let items: Vec<(StoredChunk, Vec<f32>)> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                let mut metadata = base_metadata.clone();
                if let Some(map) = metadata.as_object_mut() {
                    map.insert("source".to_string(), json!(source));
                    map.insert("chunk_index".to_string(), json!(chunk.chunk_index));
                    map.insert("start_offset".to_string(), json!(chunk.start_offset));
                }
                let stored = StoredChunk {
                    chunk_id: format!("{}_{}", source, chunk.chunk_index),
                    content: chunk.text.clone(),
                    source: source.to_string(),
                    collection: collection.to_string(),
                    metadata: Some(metadata),
                };
                (stored, embedding)
            })
            .collect();

        let written = items.len();
        store.insert_batch(items).await?;
        Ok(written)
    }
}
