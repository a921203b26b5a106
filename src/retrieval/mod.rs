//! Context retrieval from a semantic index.
//!
//! A question is embedded with an [`Embedder`] and the nearest documents are
//! fetched from a [`VectorIndex`]. Both sides are chosen once at start-up from
//! configuration and injected into [`ContextRetriever`].

mod chroma;
mod memory;
mod mock;
mod ollama;
mod openai;

pub use chroma::ChromaIndex;
pub use memory::InMemoryIndex;
pub use mock::MockEmbedder;
pub use ollama::OllamaEmbedder;
pub use openai::OpenAiEmbedder;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::EmbeddingConfig;
use crate::error::{AskError, Result};

/// Turns text into fixed-dimension vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds a batch of texts. Returns one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embeds a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AskError::retrieval("Embedding service returned no vectors"))
    }

    /// Returns the embedding model name.
    fn model(&self) -> &str;
}

/// Nearest-neighbour lookup over embedded documents.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Returns the text of up to `top_k` nearest documents, most relevant first.
    async fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<String>>;

    /// Returns the embedding dimension the index was built with, if known.
    async fn dimension(&self) -> Result<Option<usize>>;
}

/// Which embedding service produces question embeddings.
///
/// Must match the model family the index was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// OpenAI embeddings API.
    Cloud,
    /// all-MiniLM sentence transformer served by a local Ollama instance.
    Local,
}

impl EmbeddingBackend {
    /// Returns the backend as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cloud => "cloud",
            Self::Local => "local",
        }
    }

    /// Returns the model used when none is configured.
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Cloud => "text-embedding-ada-002",
            Self::Local => "all-minilm",
        }
    }
}

impl FromStr for EmbeddingBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cloud" | "openai" => Ok(Self::Cloud),
            "local" | "minilm" => Ok(Self::Local),
            _ => Err(format!("Unknown embedding backend: {}", s)),
        }
    }
}

impl std::fmt::Display for EmbeddingBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Creates the embedder for the configured backend.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    let backend = config.resolved_backend();
    let model = config
        .model
        .clone()
        .unwrap_or_else(|| backend.default_model().to_string());

    match backend {
        EmbeddingBackend::Cloud => {
            let key = config.api_key.clone().ok_or_else(|| {
                AskError::config(
                    "Cloud embeddings need an API key. Set OPENAI_API_KEY or use backend = \"local\".",
                )
            })?;
            let mut embedder = OpenAiEmbedder::new(key, model)?;
            if let Some(url) = &config.base_url {
                embedder = embedder.with_url(url.clone());
            }
            Ok(Arc::new(embedder))
        }
        EmbeddingBackend::Local => {
            let mut embedder = OllamaEmbedder::new(model)?;
            if let Some(url) = &config.base_url {
                embedder = embedder.with_url(url.clone());
            }
            Ok(Arc::new(embedder))
        }
    }
}

/// Fetches context snippets relevant to a question.
#[derive(Clone)]
pub struct ContextRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl ContextRetriever {
    /// Creates a retriever over the given embedder and index.
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Returns up to `top_k` document texts, most relevant first.
    ///
    /// An empty index yields an empty list. A query embedding whose dimension
    /// differs from the index's is an error rather than a silent mismatch.
    pub async fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<String>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed(question).await?;

        if let Some(expected) = self.index.dimension().await? {
            if expected != embedding.len() {
                return Err(AskError::retrieval(format!(
                    "Embedding dimension mismatch: model '{}' produced {} dimensions but the index holds {}. \
                     Query with the same embedding backend the index was built with.",
                    self.embedder.model(),
                    embedding.len(),
                    expected
                )));
            }
        }

        let mut snippets = self.index.query(&embedding, top_k).await?;
        snippets.truncate(top_k);

        debug!("Context snippets: {:?}", snippets);
        info!("Retrieved {} context snippets", snippets.len());
        Ok(snippets)
    }
}

impl std::fmt::Debug for ContextRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextRetriever")
            .field("embedder", &self.embedder.model())
            .finish_non_exhaustive()
    }
}
