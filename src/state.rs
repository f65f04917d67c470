use std::sync::Arc;

use crate::chunker::Chunker;
use crate::config::{AppConfig, AppPaths};
use crate::ingest::Ingestor;
use crate::llm::OpenAiCompatProvider;
use crate::store::SqliteVectorStore;

/// Shared application context: opened once at process start, passed
/// explicitly to every operation.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: AppConfig,
    pub store: Arc<SqliteVectorStore>,
    pub provider: Arc<OpenAiCompatProvider>,
    pub ingestor: Arc<Ingestor>,
}

impl AppState {
    /// Validates configuration and opens the store before any network call
    /// is attempted.
    pub async fn initialize() -> anyhow::Result<Arc<Self>> {
        let config = AppConfig::from_env()?;
        let paths = Arc::new(AppPaths::new());
        let store = Arc::new(SqliteVectorStore::new(&paths).await?);
        let provider = Arc::new(OpenAiCompatProvider::new(&config)?);
        let chunker = Chunker::new(config.chunk_size, config.chunk_overlap)?;
        let ingestor = Arc::new(Ingestor::new(chunker));

        Ok(Arc::new(AppState {
            paths,
            config,
            store,
            provider,
            ingestor,
        }))
    }
}
