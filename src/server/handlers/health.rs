use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::errors::ApiError;
use crate::state::AppState;
use crate::store::VectorStore;

/// Liveness probe reporting the stored chunk count. A store failure
/// surfaces as an error instead of a healthy-looking zero.
pub async fn health(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let chunks = state.store.count(None).await?;
    Ok(Json(json!({
        "status": "ok",
        "chunks": chunks,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{StoredChunk, VectorStore};
    use crate::test_util::scratch_state;

    #[tokio::test]
    async fn reports_stored_chunk_count() {
        let state = scratch_state("http://127.0.0.1:9").await;
        state
            .store
            .insert(
                StoredChunk {
                    chunk_id: "a_0".to_string(),
                    content: "x".to_string(),
                    source: "a".to_string(),
                    collection: "a_docs".to_string(),
                    metadata: None,
                },
                vec![1.0],
            )
            .await
            .unwrap();

        let Json(body) = health(State(state)).await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["chunks"], 1);
    }
}
