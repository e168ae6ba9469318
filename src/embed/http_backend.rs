use super::Embedder;
use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedItem>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbedItem {
    index: usize,
    embedding: Vec<f32>,
}

/// OpenAI-compatible `/v1/embeddings` backend
pub struct HttpEmbedder {
    client: Client,
    base_url: Url,
    model_id: String,
    dimension: usize,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let base_url = Url::parse(&config.backend_url)
            .map_err(|e| Error::Config(format!("Invalid embedding backend URL: {}", e)))?;
        Ok(Self {
            client: Client::new(),
            base_url,
            model_id: config.model.clone(),
            dimension: config.dimension,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("Invalid embedding backend URL: {}", e)))
    }

    fn validate_dimensions(&self, embeddings: &[Vec<f32>]) -> Result<()> {
        if let Some(mismatch) = embeddings.iter().find(|vec| vec.len() != self.dimension) {
            return Err(Error::Embedding(format!(
                "Embedding dimension mismatch for model '{}': expected {}, got {}",
                self.model_id,
                self.dimension,
                mismatch.len()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let expected = texts.len();
        let url = self.endpoint("/v1/embeddings")?;
        let request = EmbedRequest {
            model: self.model_id.clone(),
            input: texts,
        };

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let mut parsed = response.json::<EmbedResponse>().await?;
        if parsed.data.len() != expected {
            return Err(Error::Embedding(format!(
                "Backend returned {} embeddings for {} inputs",
                parsed.data.len(),
                expected
            )));
        }

        parsed.data.sort_by_key(|item| item.index);
        let embeddings: Vec<Vec<f32>> = parsed.data.into_iter().map(|item| item.embedding).collect();
        self.validate_dimensions(&embeddings)?;
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}
