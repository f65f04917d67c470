//! Knowledge-base handlers: thresholded search, ad-hoc ingestion, and
//! document lookup against the shared collection.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::ApiError;
use crate::ingest::SHARED_COLLECTION;
use crate::retriever::search_with_threshold;
use crate::state::AppState;
use crate::store::VectorStore;

const PREVIEW_CHARS: usize = 500;

fn default_limit() -> usize {
    5
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

pub async fn search_documents(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.query.trim().is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".to_string()));
    }

    let hits = search_with_threshold(
        SHARED_COLLECTION,
        &req.query,
        req.limit,
        state.config.min_score,
        state.store.as_ref(),
        state.provider.as_ref(),
    )
    .await?;

    let results: Vec<Value> = hits
        .iter()
        .map(|hit| {
            json!({
                "content": hit.chunk.content,
                "metadata": hit.chunk.metadata.clone().unwrap_or_else(|| json!({})),
                "relevance_score": hit.score,
            })
        })
        .collect();

    Ok(Json(json!({
        "query": req.query,
        "results": results,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct AddRequest {
    pub content: String,
    #[serde(default)]
    pub metadata: Option<Value>,
}

pub async fn add_document(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.content.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "content must not be empty".to_string(),
        ));
    }

    let added = state
        .ingestor
        .add_text(
            &req.content,
            req.metadata,
            state.store.as_ref(),
            state.provider.as_ref(),
        )
        .await?;

    Ok(Json(json!({
        "status": "success",
        "document_id": added.document_id,
        "document_size": added.document_size,
        "chunks_created": added.chunks_created,
        "metadata": added.metadata,
    })))
}

/// Resolves a document by its `document_id` metadata field. This is a scan
/// of the shared collection, O(n) in stored chunks, not a key lookup.
pub async fn get_document_summary(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let chunks = state
        .store
        .find_by_metadata(SHARED_COLLECTION, "document_id", &document_id)
        .await?;

    let Some(first) = chunks.first() else {
        return Err(ApiError::NotFound(format!(
            "document not found: {}",
            document_id
        )));
    };

    Ok(Json(json!({
        "document_id": document_id,
        "metadata": first.metadata.clone().unwrap_or_else(|| json!({})),
        "content_preview": preview(&first.content),
    })))
}

fn preview(content: &str) -> String {
    let mut out: String = content.chars().take(PREVIEW_CHARS).collect();
    if content.chars().count() > PREVIEW_CHARS {
        out.push_str("...");
    }
    out
}
