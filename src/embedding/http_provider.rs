//! HTTP client for an OpenAI-compatible embedding service.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, error};

use super::provider::EmbeddingProvider;

/// Embedding provider backed by a `/v1/embeddings` endpoint.
pub struct HttpEmbeddingProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    provider_key: String,
}

/// Request payload for the embedding endpoint.
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Response from the embedding endpoint.
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

fn compute_provider_key(base_url: &str, model: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"http:");
    hasher.update(base_url.as_bytes());
    hasher.update(b":");
    hasher.update(model.as_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}

impl HttpEmbeddingProvider {
    /// Create a new provider for the given service and model.
    ///
    /// `request_timeout` bounds each HTTP request; pass
    /// [`EmbedderConfig::request_timeout`](crate::types::EmbedderConfig::request_timeout).
    pub fn new(base_url: &str, model: &str, request_timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        Ok(Self {
            client: Client::builder().timeout(request_timeout).build()?,
            provider_key: compute_provider_key(&base_url, model),
            base_url,
            model: model.to_string(),
            api_key: None,
        })
    }

    /// Authenticate requests with a bearer token.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }
}

/// Decode a response body into vectors in input order.
fn parse_response(body: &[u8]) -> Result<Vec<Vec<f32>>> {
    let mut response: EmbeddingResponse = serde_json::from_slice(body)?;
    // Services may answer out of order when they report indices
    response.data.sort_by_key(|d| d.index.unwrap_or(usize::MAX));
    Ok(response.data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("empty embedding response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!(%status, "Embedding service returned an error");
            return Err(anyhow::anyhow!(
                "Embedding service returned {}: {}",
                status,
                text
            ));
        }

        let vectors = parse_response(&response.bytes().await?)?;
        debug!(inputs = texts.len(), vectors = vectors.len(), "Received embeddings");

        Ok(vectors)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_key(&self) -> &str {
        &self.provider_key
    }
}
