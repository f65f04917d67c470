//! Conversational agent loop.
//!
//! The agent holds conversation memory, asks the chat model for a decision
//! each step (a JSON tool call or a final answer), and invokes tools over
//! the MCP client transport. `clear` resets memory; everything else is a
//! query.

use async_trait::async_trait;
use rmcp::model::CallToolRequestParams;
use rmcp::service::{RoleClient, RunningService};
use rmcp::transport::TokioChildProcess;
use rmcp::ServiceExt;
use serde_json::Value;

use crate::errors::ApiError;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};

const SYSTEM_PROMPT: &str = "You are a knowledge-base assistant. You can call the tool \
search_document to retrieve snippets from the stored document topics.\n\
Respond with exactly one JSON object per turn, either\n\
{\"type\": \"tool_call\", \"tool_name\": \"search_document\", \"tool_args\": {\"query\": \"...\"}}\n\
or\n\
{\"type\": \"final\", \"content\": \"your answer\"}.\n\
Ground answers in retrieved snippets when they are relevant.";

#[derive(Debug, Clone)]
pub enum AgentDecision {
    Final(String),
    ToolCall { name: String, args: Value },
}

pub fn parse_agent_decision(text: &str) -> AgentDecision {
    if let Some(json_value) = parse_json_from_text(text) {
        if let Some(decision) = parse_decision_from_value(&json_value) {
            return decision;
        }
    }
    AgentDecision::Final(text.trim().to_string())
}

fn parse_json_from_text(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&trimmed[start..=end]).ok()
}

fn parse_decision_from_value(value: &Value) -> Option<AgentDecision> {
    let action_type = value
        .get("type")
        .or_else(|| value.get("action"))
        .and_then(|v| v.as_str())
        .unwrap_or("");

    if action_type == "tool_call" {
        let name = value
            .get("tool_name")
            .or_else(|| value.get("name"))
            .or_else(|| value.get("tool"))
            .and_then(|v| v.as_str())?;
        let args = value
            .get("tool_args")
            .or_else(|| value.get("args"))
            .cloned()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        return Some(AgentDecision::ToolCall {
            name: name.to_string(),
            args,
        });
    }

    if action_type == "final" {
        let content = value
            .get("content")
            .or_else(|| value.get("message"))
            .or_else(|| value.get("response"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        return Some(AgentDecision::Final(content));
    }

    None
}

/// Tool invocation seam, implemented over MCP in production.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn call_tool(&self, name: &str, args: Value) -> Result<String, ApiError>;
}

/// MCP client over a child-process stdio transport.
pub struct McpToolInvoker {
    service: RunningService<RoleClient, ()>,
}

impl McpToolInvoker {
    pub async fn spawn(command: tokio::process::Command) -> Result<Self, ApiError> {
        let transport = TokioChildProcess::new(command).map_err(ApiError::internal)?;
        let service = ().serve(transport).await.map_err(ApiError::internal)?;
        Ok(Self { service })
    }

    pub async fn shutdown(self) -> Result<(), ApiError> {
        self.service.cancel().await.map_err(ApiError::internal)?;
        Ok(())
    }
}

#[async_trait]
impl ToolInvoker for McpToolInvoker {
    async fn call_tool(&self, name: &str, args: Value) -> Result<String, ApiError> {
        let arguments = args.as_object().cloned();
        let mut params = CallToolRequestParams::new(name.to_string());
        params.arguments = arguments;
        let result = self
            .service
            .peer()
            .call_tool(params)
            .await
            .map_err(ApiError::internal)?;

        if let Some(structured) = result.structured_content {
            return Ok(structured.to_string());
        }

        let text = result
            .content
            .iter()
            .filter_map(|c| c.as_text().map(|t| t.text.clone()))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(text)
    }
}

pub struct ChatAgent<'a> {
    provider: &'a dyn LlmProvider,
    tools: &'a dyn ToolInvoker,
    max_steps: usize,
    history: Vec<ChatMessage>,
}

impl<'a> ChatAgent<'a> {
    pub fn new(provider: &'a dyn LlmProvider, tools: &'a dyn ToolInvoker, max_steps: usize) -> Self {
        Self {
            provider,
            tools,
            max_steps: max_steps.max(1),
            history: Vec::new(),
        }
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Runs one user turn to a final answer, invoking tools as the model
    /// requests. Tool failures are fed back to the model as observations
    /// rather than aborting the turn.
    pub async fn run(&mut self, user_message: &str) -> Result<String, ApiError> {
        self.history.push(ChatMessage::user(user_message));

        for _ in 0..self.max_steps {
            let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT)];
            messages.extend(self.history.iter().cloned());

            let reply = self
                .provider
                .chat(ChatRequest::new(messages).with_temperature(0.0))
                .await?;

            match parse_agent_decision(&reply) {
                AgentDecision::Final(answer) => {
                    self.history.push(ChatMessage::assistant(answer.clone()));
                    return Ok(answer);
                }
                AgentDecision::ToolCall { name, args } => {
                    tracing::debug!("tool call {} {}", name, args);
                    self.history.push(ChatMessage::assistant(reply));
                    let observation = match self.tools.call_tool(&name, args).await {
                        Ok(observation) => observation,
                        Err(err) => format!("tool {} failed: {}", name, err),
                    };
                    self.history
                        .push(ChatMessage::user(format!("Tool result for {}:\n{}", name, observation)));
                }
            }
        }

        Err(ApiError::Internal(format!(
            "no final answer within {} steps",
            self.max_steps
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct ScriptedProvider {
        replies: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().rev().map(|s| s.to_string()).collect()),
            }
        }
    }

    #[async_trait]
    impl crate::llm::Embedder for ScriptedProvider {
        async fn embed(&self, _inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
            unreachable!("chat tests never embed")
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn health_check(&self) -> Result<bool, ApiError> {
            Ok(true)
        }

        async fn chat(&self, _request: ChatRequest) -> Result<String, ApiError> {
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| ApiError::Internal("script exhausted".to_string()))
        }
    }

    struct RecordingInvoker {
        calls: Mutex<Vec<(String, Value)>>,
        response: String,
    }

    impl RecordingInvoker {
        fn new(response: &str) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                response: response.to_string(),
            }
        }
    }

    #[async_trait]
    impl ToolInvoker for RecordingInvoker {
        async fn call_tool(&self, name: &str, args: Value) -> Result<String, ApiError> {
            self.calls.lock().unwrap().push((name.to_string(), args));
            Ok(self.response.clone())
        }
    }

    #[test]
    fn parses_tool_call_and_final_decisions() {
        let decision = parse_agent_decision(
            r#"{"type": "tool_call", "tool_name": "search_document", "tool_args": {"query": "kafka"}}"#,
        );
        match decision {
            AgentDecision::ToolCall { name, args } => {
                assert_eq!(name, "search_document");
                assert_eq!(args["query"], "kafka");
            }
            other => panic!("expected tool call, got {:?}", other),
        }

        let decision = parse_agent_decision(r#"{"type": "final", "content": "done"}"#);
        assert!(matches!(decision, AgentDecision::Final(ref s) if s == "done"));

        // Plain prose is a final answer.
        let decision = parse_agent_decision("Just an answer.");
        assert!(matches!(decision, AgentDecision::Final(ref s) if s == "Just an answer."));
    }

    #[test]
    fn extracts_json_embedded_in_prose() {
        let decision = parse_agent_decision(
            "Sure, let me look that up: {\"type\": \"tool_call\", \"tool_name\": \"search_document\", \"tool_args\": {\"query\": \"sql\"}} ",
        );
        assert!(matches!(decision, AgentDecision::ToolCall { .. }));
    }

    #[tokio::test]
    async fn direct_final_answer() {
        let provider = ScriptedProvider::new(&[r#"{"type": "final", "content": "42"}"#]);
        let tools = RecordingInvoker::new("unused");
        let mut agent = ChatAgent::new(&provider, &tools, 10);

        let answer = agent.run("meaning of life?").await.unwrap();
        assert_eq!(answer, "42");
        assert!(tools.calls.lock().unwrap().is_empty());
        // user turn + assistant answer
        assert_eq!(agent.history_len(), 2);
    }

    #[tokio::test]
    async fn tool_call_feeds_observation_back() {
        let provider = ScriptedProvider::new(&[
            r#"{"type": "tool_call", "tool_name": "search_document", "tool_args": {"query": "kafka"}}"#,
            r#"{"type": "final", "content": "Kafka replicates logs."}"#,
        ]);
        let tools = RecordingInvoker::new("kafka_0 0.920 kafka");
        let mut agent = ChatAgent::new(&provider, &tools, 10);

        let answer = agent.run("what does kafka do?").await.unwrap();
        assert_eq!(answer, "Kafka replicates logs.");

        let calls = tools.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "search_document");
        assert_eq!(calls[0].1["query"], "kafka");
    }

    #[tokio::test]
    async fn clear_resets_memory() {
        let provider = ScriptedProvider::new(&[
            r#"{"type": "final", "content": "first"}"#,
            r#"{"type": "final", "content": "second"}"#,
        ]);
        let tools = RecordingInvoker::new("unused");
        let mut agent = ChatAgent::new(&provider, &tools, 10);

        agent.run("one").await.unwrap();
        assert_eq!(agent.history_len(), 2);
        agent.clear_history();
        assert_eq!(agent.history_len(), 0);
        agent.run("two").await.unwrap();
        assert_eq!(agent.history_len(), 2);
    }

    #[tokio::test]
    async fn step_limit_is_an_error() {
        let tool_call =
            r#"{"type": "tool_call", "tool_name": "search_document", "tool_args": {"query": "x"}}"#;
        let provider = ScriptedProvider::new(&[tool_call, tool_call, tool_call]);
        let tools = RecordingInvoker::new("nothing");
        let mut agent = ChatAgent::new(&provider, &tools, 3);

        let err = agent.run("loop forever").await.unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
