//! Local embeddings served by Ollama (the local backend).
//!
//! The default model is `all-minilm`, the 384-dimension all-MiniLM-L6-v2
//! sentence transformer.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{AskError, Result};
use crate::llm::ollama::DEFAULT_OLLAMA_URL;
use crate::retrieval::Embedder;

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Embeds text with a local Ollama instance.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    model: String,
    base_url: String,
    client: Client,
}

impl OllamaEmbedder {
    /// Creates an embedder for the given model.
    pub fn new(model: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| AskError::retrieval(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            model: model.into(),
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            client,
        })
    }

    /// Sets the base URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn embed_url(&self) -> String {
        format!("{}/api/embed", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(self.embed_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    AskError::retrieval(
                        "Failed to connect to Ollama for embeddings. Is it running? Try: ollama serve",
                    )
                } else {
                    AskError::retrieval(format!("Embedding request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AskError::retrieval(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(AskError::retrieval(format!(
                "Ollama embeddings error ({}): {}",
                status, body
            )));
        }

        let response: EmbedResponse = serde_json::from_str(&body)
            .map_err(|e| AskError::retrieval(format!("Failed to parse embeddings: {}", e)))?;

        if response.embeddings.len() != texts.len() {
            return Err(AskError::retrieval(format!(
                "Embedding service returned {} vectors for {} inputs",
                response.embeddings.len(),
                texts.len()
            )));
        }

        Ok(response.embeddings)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}
