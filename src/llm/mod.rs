mod openai_compat;
mod provider;
mod types;

pub use openai_compat::OpenAiCompatProvider;
pub use provider::{Embedder, LlmProvider};
pub use types::{ChatMessage, ChatRequest};
