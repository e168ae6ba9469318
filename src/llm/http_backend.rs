use super::{ChatMessage, Completion, LlmClient};
use crate::config::LlmConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Usage {
    total_tokens: u32,
}

/// OpenAI-compatible `/v1/chat/completions` backend
pub struct HttpLlmClient {
    client: Client,
    base_url: Url,
    model_id: String,
}

impl HttpLlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let base_url = Url::parse(&config.backend_url)
            .map_err(|e| Error::Config(format!("Invalid LLM backend URL: {}", e)))?;
        Ok(Self {
            client: Client::new(),
            base_url,
            model_id: config.model.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("Invalid LLM backend URL: {}", e)))
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<Completion> {
        let url = self.endpoint("/v1/chat/completions")?;
        let request = CompletionRequest {
            model: self.model_id.clone(),
            messages,
            temperature,
            max_tokens,
        };

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let parsed = response.json::<CompletionResponse>().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Llm("completion response contained no choices".to_string()))?;

        Ok(Completion {
            content,
            tokens_used: parsed.usage.map(|u| u.total_tokens),
        })
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(url: &str) -> LlmConfig {
        LlmConfig {
            backend_url: url.to_string(),
            model: "test-llm".to_string(),
            temperature: 0.3,
            max_tokens: 256,
        }
    }

    #[tokio::test]
    async fn test_complete_extracts_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "hello"}}],
                "usage": {"total_tokens": 12}
            })))
            .mount(&server)
            .await;

        let client = HttpLlmClient::new(&test_config(&server.uri())).unwrap();
        let completion = client
            .complete(vec![ChatMessage::user("hi")], 0.3, 256)
            .await
            .unwrap();

        assert_eq!(completion.content, "hello");
        assert_eq!(completion.tokens_used, Some(12));
    }

    #[tokio::test]
    async fn test_complete_errors_on_empty_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let client = HttpLlmClient::new(&test_config(&server.uri())).unwrap();
        let result = client.complete(vec![ChatMessage::user("hi")], 0.3, 256).await;
        assert!(matches!(result, Err(Error::Llm(_))));
    }
}
