//! End-to-end MCP round-trip: spawn the `kbase-mcp` binary against a
//! scratch data dir and a local stub embedding endpoint, then call the
//! `search_document` tool over stdio.

use axum::routing::post;
use axum::{Json, Router};
use rmcp::{
    model::CallToolRequestParams,
    transport::{ConfigureCommandExt, TokioChildProcess},
    ServiceExt,
};
use serde_json::{json, Value};

/// Deterministic 8-bin byte histogram, L2-normalized. Equal strings map to
/// equal vectors, so querying with a stored sentence wins its collection.
fn hash_embedding(text: &str) -> Vec<f32> {
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

async fn embeddings_handler(Json(body): Json<Value>) -> Json<Value> {
    let inputs: Vec<String> = match &body["input"] {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect(),
        Value::String(s) => vec![s.clone()],
        _ => Vec::new(),
    };

    let data: Vec<Value> = inputs
        .iter()
        .map(|text| json!({ "embedding": hash_embedding(text) }))
        .collect();
    Json(json!({ "data": data }))
}

async fn spawn_stub_provider() -> std::net::SocketAddr {
    let app = Router::new().route("/v1/embeddings", post(embeddings_handler));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn mcp_stdio_search_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
    let tempdir = tempfile::tempdir()?;
    let docs_dir = tempdir.path().join("docs");
    std::fs::create_dir_all(&docs_dir)?;
    std::fs::write(
        docs_dir.join("kafka.txt"),
        "Kafka brokers replicate partitioned logs across the cluster.",
    )?;
    std::fs::write(
        docs_dir.join("python.txt"),
        "Python uses significant whitespace for block structure.",
    )?;

    let provider_addr = spawn_stub_provider().await;
    let data_dir = tempdir.path().join("data");

    let bin = env!("CARGO_BIN_EXE_kbase-mcp");
    let transport = TokioChildProcess::new(tokio::process::Command::new(bin).configure(|cmd| {
        cmd.env("KBASE_API_KEY", "test-key")
            .env("KBASE_LLM_BASE_URL", format!("http://{}", provider_addr))
            .env("KBASE_DATA_DIR", &data_dir)
            .env("KBASE_DOCS_DIR", &docs_dir);
    }))?;

    let client = ().serve(transport).await?;

    let args = json!({
        "query": "Kafka brokers replicate partitioned logs across the cluster.",
        "limit": 3
    });

    let result = client
        .peer()
        .call_tool(
            CallToolRequestParams::new("search_document")
                .with_arguments(args.as_object().unwrap().clone()),
        )
        .await?;

    let structured = result.structured_content.expect("structured content");
    assert_eq!(
        structured.get("collection").and_then(|v| v.as_str()),
        Some("kafka_docs")
    );
    let results = structured
        .get("results")
        .and_then(|v| v.as_array())
        .expect("results array");
    assert!(!results.is_empty());
    assert_eq!(
        results[0].get("chunkId").and_then(|v| v.as_str()),
        Some("kafka_0")
    );

    client.cancel().await?;
    Ok(())
}
