//! Deterministic embedder for tests and offline runs.
//!
//! Hashes each lower-cased word into one of `dimension` buckets, so texts that
//! share words land close together under cosine similarity.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{AskError, Result};
use crate::retrieval::Embedder;

/// Bag-of-words hashing embedder.
#[derive(Debug)]
pub struct MockEmbedder {
    dimension: usize,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl MockEmbedder {
    /// Creates an embedder producing vectors of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Creates an embedder that fails every call with the given message.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new(1)
        }
    }

    /// Returns the number of batches embedded so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = fnv1a(&word.to_lowercase()) % self.dimension as u64;
            vector[bucket as usize] += 1.0;
        }
        vector
    }
}

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf29ce484222325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x100000001b3)
    })
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = &self.failure {
            return Err(AskError::retrieval(message.clone()));
        }

        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn model(&self) -> &str {
        "mock-hashing"
    }
}
