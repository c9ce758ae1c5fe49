//! Embedding acquisition and vector utilities.
//!
//! [`Embedder`] is the seam between the pipeline and the network: the
//! production implementation is [`HttpEmbedder`], which calls an external
//! provider's `/api/embeddings` endpoint with a per-call timeout and a
//! bounded retry loop. Tests substitute scripted implementations.
//!
//! Also provides the vector helpers shared by the stores and the retrieval
//! engine:
//! - [`cosine_similarity`]: similarity between two embedding vectors
//! - [`vec_to_blob`]: encode a `Vec<f32>` as little-endian bytes for BLOB storage
//! - [`blob_to_vec`]: decode a BLOB back into a `Vec<f32>`
//!
//! # Retry strategy
//!
//! Transient failures (network error, timeout, any non-2xx status) are
//! retried up to `max_attempts`. The sleep before attempt `n+1` is
//! `retry_delay × n`, linear in the attempt number rather than exponential,
//! so the worst-case latency of a document run stays predictable. A vector
//! of the wrong dimensionality is a deployment configuration error and is
//! never retried.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::EmbedError;

/// Produces fixed-dimensionality vectors for chunk and query text.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Vector dimensionality every `embed` result carries.
    fn dims(&self) -> usize;
}

/// Embedding client for an HTTP provider speaking the
/// `POST {base_url}/api/embeddings` / `{"model", "prompt"}` wire contract.
pub struct HttpEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dims: usize,
    max_attempts: u32,
    retry_delay: Duration,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Option<Vec<f32>>,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbedError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| EmbedError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dims: config.dims,
            max_attempts: config.max_attempts.max(1),
            retry_delay: config.retry_delay(),
        })
    }

    async fn request_once(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": text,
        });

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbedError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(EmbedError::Provider {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::Transport(e.to_string()))?;

        parsed.embedding.ok_or(EmbedError::MalformedResponse)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut last_err = String::new();

        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                let delay = self.retry_delay * (attempt - 1);
                tracing::warn!(
                    attempt,
                    delay_secs = delay.as_secs(),
                    "embedding attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }

            match self.request_once(text).await {
                Ok(vector) => {
                    if vector.len() != self.dims {
                        return Err(EmbedError::Dimensions {
                            expected: self.dims,
                            got: vector.len(),
                        });
                    }
                    return Ok(vector);
                }
                Err(EmbedError::MalformedResponse) => return Err(EmbedError::MalformedResponse),
                Err(err) => last_err = err.to_string(),
            }
        }

        Err(EmbedError::Exhausted {
            attempts: self.max_attempts,
            last: last_err,
        })
    }

    fn dims(&self) -> usize {
        self.dims
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`; `0.0` for empty vectors, vectors of
/// different lengths, or zero-magnitude vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
