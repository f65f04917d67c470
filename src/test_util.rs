//! Test helpers: deterministic embedders, scratch stores, and a stub
//! provider endpoint for exercising handlers end to end.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::chunker::Chunker;
use crate::config::{AppConfig, AppPaths};
use crate::errors::ApiError;
use crate::ingest::Ingestor;
use crate::llm::{Embedder, OpenAiCompatProvider};
use crate::state::AppState;
use crate::store::SqliteVectorStore;

/// Deterministic local embedder: an 8-bin byte histogram, L2-normalized.
/// Equal strings map to equal vectors; overlapping strings score higher
/// than disjoint ones.
pub struct HashEmbedder;

pub fn hash_embedding(text: &str) -> Vec<f32> {
    let mut v = [0f32; 8];
    for b in text.bytes() {
        v[(b % 8) as usize] += 1.0;
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v.to_vec()
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        Ok(inputs.iter().map(|s| hash_embedding(s)).collect())
    }
}

/// Returns the same fixed vector for every input. Used when a test controls
/// stored embeddings directly and needs a known query vector.
pub struct FixedEmbedder(pub Vec<f32>);

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        Ok(inputs.iter().map(|_| self.0.clone()).collect())
    }
}

pub async fn scratch_store() -> SqliteVectorStore {
    let tmp = std::env::temp_dir().join(format!("kbase-test-{}.db", uuid::Uuid::new_v4()));
    SqliteVectorStore::with_path(tmp).await.unwrap()
}

/// Local `/v1/embeddings` endpoint backed by `hash_embedding`, so handler
/// tests can run a real provider round trip without a network.
pub async fn stub_embeddings_server() -> std::net::SocketAddr {
    async fn embeddings(
        axum::Json(body): axum::Json<serde_json::Value>,
    ) -> axum::Json<serde_json::Value> {
        let data: Vec<serde_json::Value> = body["input"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(|text| serde_json::json!({ "embedding": hash_embedding(text) }))
                    .collect()
            })
            .unwrap_or_default();
        axum::Json(serde_json::json!({ "data": data }))
    }

    let app = axum::Router::new().route("/v1/embeddings", axum::routing::post(embeddings));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Full `AppState` over a scratch store and the given provider base URL.
pub async fn scratch_state(llm_base_url: &str) -> Arc<AppState> {
    let dir = std::env::temp_dir().join(format!("kbase-state-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();

    let paths = AppPaths {
        data_dir: dir.clone(),
        log_dir: dir.join("logs"),
        db_path: dir.join("kbase.db"),
    };
    let config = AppConfig {
        llm_base_url: llm_base_url.to_string(),
        api_key: "test-key".to_string(),
        chat_model: "chat".to_string(),
        embed_model: "embed".to_string(),
        docs_dir: None,
        chunk_size: 200,
        chunk_overlap: 20,
        min_score: 0.0,
        request_timeout: Duration::from_secs(5),
        max_agent_steps: 10,
    };

    let store = Arc::new(SqliteVectorStore::with_path(paths.db_path.clone()).await.unwrap());
    let provider = Arc::new(OpenAiCompatProvider::new(&config).unwrap());
    let ingestor = Arc::new(Ingestor::new(
        Chunker::new(config.chunk_size, config.chunk_overlap).unwrap(),
    ));

    Arc::new(AppState {
        paths: Arc::new(paths),
        config,
        store,
        provider,
        ingestor,
    })
}
