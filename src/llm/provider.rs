use async_trait::async_trait;

use super::types::ChatRequest;
use crate::errors::ApiError;

/// Embedding seam used by ingestion and retrieval. Kept separate from
/// `LlmProvider` so stores and retrievers can be tested with a
/// deterministic stub.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate one embedding vector per input, in order.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError>;
}

#[async_trait]
pub trait LlmProvider: Embedder {
    /// Provider name (e.g. "openai-compat").
    fn name(&self) -> &str;

    /// Check if the provider is reachable.
    async fn health_check(&self) -> Result<bool, ApiError>;

    /// Chat completion (non-streaming).
    async fn chat(&self, request: ChatRequest) -> Result<String, ApiError>;
}
