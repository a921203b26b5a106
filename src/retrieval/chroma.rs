//! Chroma vector index over the HTTP API (v2).

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::IndexConfig;
use crate::error::{AskError, Result};
use crate::retrieval::VectorIndex;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// A Chroma collection queried over HTTP.
///
/// The collection is populated externally; this type only reads from it.
#[derive(Debug, Clone)]
pub struct ChromaIndex {
    base_url: String,
    tenant: String,
    database: String,
    collection: String,
    client: Client,
}

impl ChromaIndex {
    /// Creates an index handle from configuration. No request is made yet.
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| AskError::retrieval(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url(),
            tenant: config.tenant.clone(),
            database: config.database.clone(),
            collection: config.collection.clone(),
            client,
        })
    }

    fn collections_url(&self) -> String {
        format!(
            "{}/api/v2/tenants/{}/databases/{}/collections",
            self.base_url.trim_end_matches('/'),
            self.tenant,
            self.database
        )
    }

    /// Pings the server. Returns the heartbeat clock in nanoseconds.
    pub async fn heartbeat(&self) -> Result<u64> {
        let url = format!("{}/api/v2/heartbeat", self.base_url.trim_end_matches('/'));

        let response = self.client.get(&url).send().await.map_err(|e| {
            AskError::retrieval(format!(
                "Failed to reach Chroma at {}: {}",
                self.base_url, e
            ))
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AskError::retrieval(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(AskError::retrieval(format!(
                "Chroma heartbeat error ({}): {}",
                status, body
            )));
        }

        parse_heartbeat(&body)
    }

    /// Returns the configured collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Returns the server base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Looks up the collection's id and dimension.
    async fn describe_collection(&self) -> Result<CollectionInfo> {
        let url = format!("{}/{}", self.collections_url(), self.collection);

        let response = self.client.get(&url).send().await.map_err(|e| {
            AskError::retrieval(format!(
                "Failed to reach Chroma at {}: {}",
                self.base_url, e
            ))
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AskError::retrieval(format!("Failed to read response: {}", e)))?;

        match status {
            s if s.is_success() => serde_json::from_str(&body).map_err(|e| {
                AskError::retrieval(format!("Failed to parse Chroma collection: {}", e))
            }),
            s if s == StatusCode::NOT_FOUND => Err(AskError::retrieval(format!(
                "Collection '{}' not found in Chroma at {}. Build the semantic index first.",
                self.collection, self.base_url
            ))),
            _ => Err(AskError::retrieval(format!(
                "Chroma error ({}): {}",
                status, body
            ))),
        }
    }
}

#[async_trait]
impl VectorIndex for ChromaIndex {
    async fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<String>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let collection = self.describe_collection().await?;
        let url = format!("{}/{}/query", self.collections_url(), collection.id);
        let request = QueryRequest {
            query_embeddings: vec![embedding],
            n_results: top_k,
            include: vec!["documents"],
        };

        debug!("Querying Chroma collection {} for {} results", collection.id, top_k);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AskError::retrieval(format!("Chroma query failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AskError::retrieval(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(AskError::retrieval(format!(
                "Chroma query error ({}): {}",
                status, body
            )));
        }

        parse_query_response(&body)
    }

    async fn dimension(&self) -> Result<Option<usize>> {
        Ok(self.describe_collection().await?.dimension)
    }
}

fn parse_heartbeat(body: &str) -> Result<u64> {
    let heartbeat: Heartbeat = serde_json::from_str(body)
        .map_err(|e| AskError::retrieval(format!("Failed to parse Chroma heartbeat: {}", e)))?;
    Ok(heartbeat.nanos)
}

/// Extracts document texts for the single query embedding, in rank order.
fn parse_query_response(body: &str) -> Result<Vec<String>> {
    let response: QueryResponse = serde_json::from_str(body)
        .map_err(|e| AskError::retrieval(format!("Failed to parse Chroma query result: {}", e)))?;

    Ok(response
        .documents
        .and_then(|per_query| per_query.into_iter().next())
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .collect())
}

#[derive(Debug, Deserialize)]
struct Heartbeat {
    #[serde(rename = "nanosecond heartbeat")]
    nanos: u64,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    id: String,
    #[serde(default)]
    dimension: Option<usize>,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query_embeddings: Vec<&'a [f32]>,
    n_results: usize,
    include: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
}
