//! MCP entry point: optionally ingests the source directory, then serves
//! the `search_document` tool over stdio.

use std::sync::Arc;

use kbase_backend::ingest::{self, SHARED_COLLECTION};
use kbase_backend::llm::Embedder;
use kbase_backend::logging;
use kbase_backend::mcp_server::{serve_stdio, KbaseMcpServer, KbaseState};
use kbase_backend::retriever::Retriever;
use kbase_backend::state::AppState;
use kbase_backend::store::VectorStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let state = AppState::initialize().await?;
    logging::init(&state.paths);

    // The registry is explicit: file stems of the source directory when one
    // is configured, otherwise whatever topic collections already exist.
    let registry = if let Some(dir) = &state.config.docs_dir {
        state
            .ingestor
            .ingest_dir(dir, state.store.as_ref(), state.provider.as_ref())
            .await?;
        ingest::topic_collections(dir)?
    } else {
        state
            .store
            .list_collections()
            .await?
            .into_iter()
            .filter(|name| name != SHARED_COLLECTION)
            .collect()
    };
    tracing::info!("serving search_document over {} collection(s)", registry.len());

    let store: Arc<dyn VectorStore> = state.store.clone();
    let embedder: Arc<dyn Embedder> = state.provider.clone();
    let server = KbaseMcpServer::new(KbaseState {
        store,
        embedder,
        retriever: Retriever::new(registry),
    });

    serve_stdio(server).await
}
