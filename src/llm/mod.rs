//! LLM completion client
//!
//! Used by the LLM classifier and the query rewriter. Both callers parse
//! the raw completion text themselves (typically as strict JSON).

mod http_backend;

pub use http_backend::*;

use crate::config::LlmConfig;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One chat turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A completion result
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub tokens_used: Option<u32>,
}

/// Trait for LLM completion providers
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<Completion>;

    fn model_name(&self) -> &str;
}

/// Create an LLM client based on configuration
pub fn create_llm_client(config: &LlmConfig) -> Result<Box<dyn LlmClient>> {
    let client = HttpLlmClient::new(config)?;
    Ok(Box::new(client))
}

/// Strip markdown code fences an LLM may wrap around a JSON reply.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences(r#"{"a":1}"#), r#"{"a":1}"#);
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), r#"{"a":1}"#);
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), r#"{"a":1}"#);
    }
}
