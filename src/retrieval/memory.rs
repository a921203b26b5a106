//! In-memory vector index with exact cosine search.

use async_trait::async_trait;

use crate::error::{AskError, Result};
use crate::retrieval::{Embedder, VectorIndex};

/// A document text and its embedding.
#[derive(Debug, Clone)]
struct Entry {
    text: String,
    embedding: Vec<f32>,
}

/// Linear-scan vector index held in memory.
///
/// Suitable for tests and small offline semantic layers.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIndex {
    entries: Vec<Entry>,
    dimension: Option<usize>,
}

impl InMemoryIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Embeds the documents in one batch and indexes them.
    pub async fn from_documents(embedder: &dyn Embedder, documents: Vec<String>) -> Result<Self> {
        let mut index = Self::new();
        if documents.is_empty() {
            return Ok(index);
        }

        let embeddings = embedder.embed_batch(&documents).await?;
        if embeddings.len() != documents.len() {
            return Err(AskError::retrieval(format!(
                "Embedding service returned {} vectors for {} documents",
                embeddings.len(),
                documents.len()
            )));
        }

        for (text, embedding) in documents.into_iter().zip(embeddings) {
            index.insert(text, embedding)?;
        }
        Ok(index)
    }

    /// Adds a document. All embeddings must share one dimension.
    pub fn insert(&mut self, text: impl Into<String>, embedding: Vec<f32>) -> Result<()> {
        match self.dimension {
            Some(dim) if dim != embedding.len() => {
                return Err(AskError::retrieval(format!(
                    "Embedding dimension {} doesn't match index dimension {}",
                    embedding.len(),
                    dim
                )));
            }
            Some(_) => {}
            None => self.dimension = Some(embedding.len()),
        }

        self.entries.push(Entry {
            text: text.into(),
            embedding,
        });
        Ok(())
    }

    /// Returns the number of indexed documents.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<String>> {
        let mut scored: Vec<(f32, &Entry)> = self
            .entries
            .iter()
            .map(|entry| (cosine_similarity(embedding, &entry.embedding), entry))
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(_, entry)| entry.text.clone())
            .collect())
    }

    async fn dimension(&self) -> Result<Option<usize>> {
        Ok(self.dimension)
    }
}

/// Computes cosine similarity between two vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
