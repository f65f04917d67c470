pub mod chat;
pub mod chunker;
pub mod config;
pub mod errors;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod mcp_server;
pub mod retriever;
pub mod server;
pub mod state;
pub mod store;

#[cfg(test)]
pub(crate) mod test_util;
