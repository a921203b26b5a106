//! OpenAI embeddings API client (the cloud backend).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{AskError, Result};
use crate::llm::openai::DEFAULT_OPENAI_URL;
use crate::retrieval::Embedder;

/// Default timeout for embedding requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Embeds text with the OpenAI embeddings endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

impl OpenAiEmbedder {
    /// Creates an embedder for the given key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| AskError::retrieval(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_OPENAI_URL.to_string(),
            client,
        })
    }

    /// Sets the base URL (for Azure OpenAI or compatible APIs).
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn embeddings_url(&self) -> String {
        format!("{}/embeddings", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(self.embeddings_url())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AskError::retrieval(format!("OpenAI embeddings request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AskError::retrieval(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(AskError::retrieval(format!(
                "OpenAI embeddings error ({}): {}",
                status, body
            )));
        }

        parse_embeddings(&body, texts.len())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Parses an embeddings response, restoring input order.
fn parse_embeddings(body: &str, expected: usize) -> Result<Vec<Vec<f32>>> {
    let mut response: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|e| AskError::retrieval(format!("Failed to parse embeddings response: {}", e)))?;

    if response.data.len() != expected {
        return Err(AskError::retrieval(format!(
            "Embedding service returned {} vectors for {} inputs",
            response.data.len(),
            expected
        )));
    }

    response.data.sort_by_key(|d| d.index);
    Ok(response.data.into_iter().map(|d| d.embedding).collect())
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}
