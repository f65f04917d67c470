//! MCP surface: exposes knowledge-base search as a callable tool over the
//! stdio transport, for invocation by an agent runtime.

use std::sync::Arc;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::llm::Embedder;
use crate::retriever::Retriever;
use crate::store::VectorStore;

const DEFAULT_SEARCH_LIMIT: usize = 5;

pub struct KbaseState {
    pub store: Arc<dyn VectorStore>,
    pub embedder: Arc<dyn Embedder>,
    pub retriever: Retriever,
}

#[derive(Clone)]
pub struct KbaseMcpServer {
    state: Arc<KbaseState>,
    tool_router: ToolRouter<Self>,
}

impl KbaseMcpServer {
    pub fn new(state: KbaseState) -> Self {
        Self {
            state: Arc::new(state),
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router(router = tool_router)]
impl KbaseMcpServer {
    /// Fan-out search across topic collections, returning the best
    /// collection's result set.
    #[tool(
        name = "search_document",
        description = "Search the knowledge base for relevant documents. Returns the best-matching topic's chunks with relevance scores."
    )]
    pub async fn search_document(
        &self,
        params: Parameters<SearchDocumentParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;
        let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);

        let best = self
            .state
            .retriever
            .search_best_collection(
                &params.query,
                limit,
                self.state.store.as_ref(),
                self.state.embedder.as_ref(),
            )
            .await
            .map_err(|e| mcp_error("search failed", e))?;

        let (collection, items) = match best {
            Some(found) => {
                let items: Vec<SearchResultItem> = found
                    .hits
                    .iter()
                    .map(|hit| SearchResultItem {
                        chunk_id: hit.chunk.chunk_id.clone(),
                        content: hit.chunk.content.clone(),
                        source: hit.chunk.source.clone(),
                        score: hit.score,
                    })
                    .collect();
                (Some(found.collection), items)
            }
            None => (None, Vec::new()),
        };

        let summary = format_search_summary(&params.query, collection.as_deref(), &items);
        let structured = serde_json::to_value(SearchResponse {
            query: params.query,
            collection,
            result_count: items.len(),
            results: items,
        })
        .map_err(|e| mcp_error("failed to serialize search results", e))?;

        let mut result = CallToolResult::success(vec![Content::text(summary)]);
        result.structured_content = Some(structured);
        Ok(result)
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for KbaseMcpServer {
    fn get_info(&self) -> ServerInfo {
        let mut info = ServerInfo::default();
        info.capabilities = ServerCapabilities::builder().enable_tools().build();
        let mut server_info = Implementation::new("kbase", env!("CARGO_PKG_VERSION"));
        server_info.title = Some("kbase knowledge base".to_string());
        info.server_info = server_info;
        info.instructions = Some(
            "Use search_document to find snippets from the stored document topics."
                .to_string(),
        );
        info
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchDocumentParams {
    /// Search query string.
    pub query: String,
    /// Maximum number of results (default: 5).
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    query: String,
    collection: Option<String>,
    result_count: usize,
    results: Vec<SearchResultItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchResultItem {
    chunk_id: String,
    content: String,
    source: String,
    score: f32,
}

fn format_search_summary(
    query: &str,
    collection: Option<&str>,
    results: &[SearchResultItem],
) -> String {
    let Some(collection) = collection else {
        return format!("No results found for \"{query}\"");
    };

    let mut lines = Vec::with_capacity(results.len() + 1);
    let suffix = if results.len() == 1 { "" } else { "s" };
    lines.push(format!(
        "Found {} result{} for \"{query}\" in {collection}:",
        results.len(),
        suffix
    ));
    for item in results {
        lines.push(format!("{} {:.3} {}", item.chunk_id, item.score, item.source));
    }
    lines.join("\n")
}

fn mcp_error(message: &str, error: impl std::fmt::Display) -> rmcp::ErrorData {
    rmcp::ErrorData::internal_error(
        message.to_string(),
        Some(json!({ "error": error.to_string() })),
    )
}

/// Serves the tool over stdio until the client disconnects.
pub async fn serve_stdio(server: KbaseMcpServer) -> anyhow::Result<()> {
    let transport = rmcp::transport::stdio();
    let running = server
        .serve(transport)
        .await
        .map_err(|e| anyhow::anyhow!("MCP server initialization failed: {e}"))?;
    running
        .waiting()
        .await
        .map_err(|e| anyhow::anyhow!("MCP server error: {e}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoredChunk;
    use crate::test_util::{hash_embedding, scratch_store, HashEmbedder};

    async fn test_server() -> KbaseMcpServer {
        let store = scratch_store().await;

        for (id, content, collection) in [
            ("python_0", "Python uses significant whitespace", "python_docs"),
            ("kafka_0", "Kafka brokers replicate partitioned logs", "kafka_docs"),
        ] {
            let embedding = hash_embedding(content);
            store
                .insert(
                    StoredChunk {
                        chunk_id: id.to_string(),
                        content: content.to_string(),
                        source: id.split('_').next().unwrap().to_string(),
                        collection: collection.to_string(),
                        metadata: None,
                    },
                    embedding,
                )
                .await
                .unwrap();
        }

        let retriever = Retriever::new(vec![
            "python_docs".to_string(),
            "kafka_docs".to_string(),
            "sql_docs".to_string(),
        ]);

        KbaseMcpServer::new(KbaseState {
            store: Arc::new(store),
            embedder: Arc::new(HashEmbedder),
            retriever,
        })
    }

    #[tokio::test]
    async fn search_tool_returns_structured_results() {
        let server = test_server().await;

        let result = server
            .search_document(Parameters(SearchDocumentParams {
                query: "Kafka brokers replicate partitioned logs".to_string(),
                limit: Some(3),
            }))
            .await
            .unwrap();

        let structured = result.structured_content.expect("structured");
        assert_eq!(
            structured.get("collection").and_then(|v| v.as_str()),
            Some("kafka_docs")
        );
        let results = structured
            .get("results")
            .and_then(|v| v.as_array())
            .expect("results array");
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].get("chunkId").and_then(|v| v.as_str()),
            Some("kafka_0")
        );

        let summary = result
            .content
            .first()
            .and_then(|c| c.as_text())
            .map(|t| t.text.clone())
            .unwrap_or_default();
        assert!(summary.contains("Found 1 result"));
        assert!(summary.contains("kafka_docs"));
    }

    #[tokio::test]
    async fn empty_store_yields_no_results_not_error() {
        let store = scratch_store().await;
        let server = KbaseMcpServer::new(KbaseState {
            store: Arc::new(store),
            embedder: Arc::new(HashEmbedder),
            retriever: Retriever::new(vec!["python_docs".to_string()]),
        });

        let result = server
            .search_document(Parameters(SearchDocumentParams {
                query: "anything".to_string(),
                limit: None,
            }))
            .await
            .unwrap();

        let structured = result.structured_content.expect("structured");
        assert!(structured.get("collection").unwrap().is_null());
        assert_eq!(
            structured.get("resultCount").and_then(|v| v.as_u64()),
            Some(0)
        );

        let summary = result
            .content
            .first()
            .and_then(|c| c.as_text())
            .map(|t| t.text.clone())
            .unwrap_or_default();
        assert!(summary.contains("No results found"));
    }
}
