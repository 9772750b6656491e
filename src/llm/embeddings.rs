use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::llm::error::{LlmError, LlmResult};

/// Maximum characters sent for one query embedding
const MAX_EMBED_CHARS: usize = 8_000;

/// Produces the query vector for the semantic branch
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> LlmResult<Vec<f32>>;

    fn model(&self) -> &str;
}

fn truncate_for_embedding(text: &str) -> &str {
    if text.len() <= MAX_EMBED_CHARS {
        return text;
    }
    let mut end = MAX_EMBED_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// OpenAI-compatible `/v1/embeddings` client
pub struct OpenAiEmbeddings {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbeddings {
    /// `None` when no API key is configured; semantic search then runs lexically
    pub fn from_config(config: &LlmConfig) -> LlmResult<Option<Self>> {
        let Some(api_key) = config.api_key() else {
            return Ok(None);
        };
        Ok(Some(Self::new(config, api_key)?))
    }

    pub fn new(config: &LlmConfig, api_key: String) -> LlmResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.embedding_model.clone(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    async fn embed(&self, text: &str) -> LlmResult<Vec<f32>> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: &self.model,
            input: truncate_for_embedding(text),
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, body });
        }

        let body: EmbeddingResponse = response.json().await?;
        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| LlmError::InvalidResponse("no embedding returned".to_string()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}
