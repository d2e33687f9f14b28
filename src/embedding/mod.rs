//! Embedding gateway: text in, fixed-dimension vectors out.
//!
//! Defines the [`Embedder`] trait and the remote implementations:
//! - **[`OpenAIEmbedder`]**: calls an OpenAI-compatible `POST /embeddings` endpoint.
//! - **[`OllamaEmbedder`]**: calls a local Ollama instance's `/api/embed` endpoint.
//! - **[`RetryingEmbedder`]**: opt-in caller-side decorator adding exponential backoff.
//!
//! Also provides the vector utilities used by the index:
//! - [`l2_squared`]: squared Euclidean distance
//! - [`vec_to_blob`]: encode a `&[f32]` as little-endian bytes
//! - [`blob_to_vec`]: decode little-endian bytes back into a `Vec<f32>`
//!
//! # Gateway contract
//!
//! Every implementation returns exactly one vector per input, in input
//! order, all with the same dimensionality. A response that breaks this is
//! reported as a gateway error rather than handed to the index. The remote
//! gateways never retry on their own; wrap them in a [`RetryingEmbedder`]
//! (configured via `embedding.max_retries`) to get backoff.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, EmbeddingConfig};
use crate::error::{service_label, status_error, RagError, RagResult};

/// Trait for embedding backends.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-large"`).
    fn model_name(&self) -> &str;

    /// Embed a batch of texts, one vector per input, order-preserving.
    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>>;

    /// Embed a single text (e.g. a query).
    async fn embed_one(&self, text: &str) -> RagResult<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::permanent("Empty embedding response"))
    }
}

#[async_trait]
impl<E: Embedder + ?Sized> Embedder for Arc<E> {
    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        (**self).embed_batch(texts).await
    }

    async fn embed_one(&self, text: &str) -> RagResult<Vec<f32>> {
        (**self).embed_one(text).await
    }
}

/// Verify a gateway response against the request: one non-empty vector per
/// input, all of identical dimensionality.
pub fn check_batch(expected: usize, vectors: Vec<Vec<f32>>) -> RagResult<Vec<Vec<f32>>> {
    if vectors.len() != expected {
        return Err(RagError::permanent(format!(
            "embedding service returned {} vectors for {} inputs",
            vectors.len(),
            expected
        )));
    }
    if let Some(first) = vectors.first() {
        let dims = first.len();
        if dims == 0 {
            return Err(RagError::permanent("embedding service returned an empty vector"));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            return Err(RagError::permanent(format!(
                "embedding service returned mixed dimensionality ({} and {})",
                dims,
                bad.len()
            )));
        }
    }
    Ok(vectors)
}

// ============ OpenAI ============

/// Embedder backed by an OpenAI-compatible `/embeddings` endpoint.
///
/// Large inputs are split into requests of at most `batch_size` texts; the
/// results are concatenated back in input order.
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    batch_size: usize,
    service: String,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig, api_key: String) -> RagResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::Configuration(format!("HTTP client: {}", e)))?;

        let base_url = config.base_url().trim_end_matches('/').to_string();
        Ok(Self {
            client,
            service: service_label(&base_url),
            base_url,
            model: config.model.clone(),
            api_key,
            batch_size: config.batch_size.max(1),
        })
    }

    async fn request(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(status_error(&self.service, status, &body_text));
        }

        let json: serde_json::Value = response.json().await?;
        parse_openai_response(&json)
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            tracing::debug!(model = %self.model, batch = batch.len(), "embedding batch");
            vectors.extend(check_batch(batch.len(), self.request(batch).await?)?);
        }

        // Dimensionality must also agree across requests.
        check_batch(texts.len(), vectors)
    }
}

/// Parse the OpenAI embeddings API response JSON.
///
/// Extracts `data[].embedding` and orders the vectors by `data[].index`,
/// which the API does not promise to return sorted.
pub fn parse_openai_response(json: &serde_json::Value) -> RagResult<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| RagError::permanent("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());

    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| RagError::permanent("Invalid OpenAI response: missing embedding"))?;

        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);

        indexed.push((index, json_to_vec(embedding)?));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

fn json_to_vec(values: &[serde_json::Value]) -> RagResult<Vec<f32>> {
    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| RagError::permanent("Invalid embedding: non-numeric component"))
        })
        .collect()
}

// ============ Ollama ============

/// Embedder backed by a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured URL (default
/// `http://localhost:11434`). Requires an embedding model to be pulled
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> RagResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.base_url().trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/api/embed", self.url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                RagError::transient(format!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.url, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(status_error("Ollama", status, &body_text));
        }

        let json: serde_json::Value = response.json().await?;
        check_batch(texts.len(), parse_ollama_response(&json)?)
    }
}

pub fn parse_ollama_response(json: &serde_json::Value) -> RagResult<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| RagError::permanent("Invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|embedding| {
            let values = embedding.as_array().ok_or_else(|| {
                RagError::permanent("Invalid Ollama response: embedding is not an array")
            })?;
            json_to_vec(values)
        })
        .collect()
}

// ============ Retry decorator ============

/// Caller-side resilience wrapper around any [`Embedder`].
///
/// Retries transient gateway errors (429, 5xx, network) with exponential
/// backoff: `base_delay`, `2 × base_delay`, `4 × base_delay`, … capped at
/// `32 × base_delay`. Permanent errors are returned immediately.
pub struct RetryingEmbedder<E> {
    inner: E,
    max_retries: u32,
    base_delay: Duration,
}

impl<E: Embedder> RetryingEmbedder<E> {
    pub fn new(inner: E, max_retries: u32) -> Self {
        Self {
            inner,
            max_retries,
            base_delay: Duration::from_secs(1),
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }
}

#[async_trait]
impl<E: Embedder> Embedder for RetryingEmbedder<E> {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        let mut attempt = 0u32;
        loop {
            match self.inner.embed_batch(texts).await {
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.base_delay * (1u32 << (attempt - 1).min(5));
                    tracing::warn!(attempt, ?delay, error = %e, "embedding failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }
}

/// Create the embedder named by `embedding.provider`.
///
/// | Config Value | Embedder |
/// |-------------|----------|
/// | `"openai"` | [`OpenAIEmbedder`] (requires the API key) |
/// | `"ollama"` | [`OllamaEmbedder`] |
///
/// When `embedding.max_retries > 0` the embedder is wrapped in a
/// [`RetryingEmbedder`].
pub fn create_embedder(config: &Config) -> RagResult<Arc<dyn Embedder>> {
    let embedding = &config.embedding;
    let base: Arc<dyn Embedder> = match embedding.provider.as_str() {
        "openai" => Arc::new(OpenAIEmbedder::new(embedding, config.require_api_key()?)?),
        "ollama" => Arc::new(OllamaEmbedder::new(embedding)?),
        other => {
            return Err(RagError::Configuration(format!(
                "Unknown embedding provider: {}",
                other
            )))
        }
    };

    if embedding.max_retries > 0 {
        Ok(Arc::new(RetryingEmbedder::new(base, embedding.max_retries)))
    } else {
        Ok(base)
    }
}

// ============ Vector utilities ============

/// Squared Euclidean distance. Both slices must have the same length.
pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Encode a float vector as little-endian f32 bytes (`vec.len() × 4` bytes).
///
/// # Example
///
/// ```rust
/// use doc_rag::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode little-endian f32 bytes. Reverses [`vec_to_blob`]; a trailing
/// partial value is ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        let restored = blob_to_vec(&blob);
        assert_eq!(vec, restored);
    }

    #[test]
    fn test_l2_identical_is_zero() {
        let v = vec![0.3, -1.0, 2.5];
        assert_eq!(l2_squared(&v, &v), 0.0);
    }

    #[test]
    fn test_l2_known_value() {
        let a = vec![0.0, 0.0];
        let b = vec![3.0, 4.0];
        assert!((l2_squared(&a, &b) - 25.0).abs() < 1e-6);
    }

    #[test]
    fn test_parse_openai_reorders_by_index() {
        let json = serde_json::json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] }
            ]
        });
        let vecs = parse_openai_response(&json).unwrap();
        assert_eq!(vecs, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_parse_openai_missing_data() {
        let err = parse_openai_response(&serde_json::json!({ "error": "nope" })).unwrap_err();
        assert!(err.is_gateway());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_parse_ollama() {
        let json = serde_json::json!({ "embeddings": [[0.5, 0.25], [1.0, 2.0]] });
        let vecs = parse_ollama_response(&json).unwrap();
        assert_eq!(vecs.len(), 2);
        assert_eq!(vecs[1], vec![1.0, 2.0]);
    }

    #[test]
    fn test_check_batch_count_mismatch() {
        let err = check_batch(2, vec![vec![1.0]]).unwrap_err();
        assert!(err.to_string().contains("1 vectors for 2 inputs"));
    }

    #[test]
    fn test_check_batch_mixed_dims() {
        assert!(check_batch(2, vec![vec![1.0, 2.0], vec![1.0]]).is_err());
        assert!(check_batch(2, vec![vec![1.0, 2.0], vec![3.0, 4.0]]).is_ok());
    }

    /// Fails with a transient error `failures` times, then succeeds.
    struct Flaky {
        calls: AtomicU32,
        failures: u32,
        retryable: bool,
    }

    #[async_trait]
    impl Embedder for Flaky {
        fn model_name(&self) -> &str {
            "flaky"
        }

        async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(RagError::Gateway {
                    message: "rate limited".to_string(),
                    retryable: self.retryable,
                });
            }
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_errors() {
        let embedder = RetryingEmbedder::new(
            Flaky {
                calls: AtomicU32::new(0),
                failures: 2,
                retryable: true,
            },
            3,
        )
        .with_base_delay(Duration::from_millis(1));

        let v = embedder.embed_one("hello").await.unwrap();
        assert_eq!(v, vec![1.0]);
        assert_eq!(embedder.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_retries() {
        let embedder = RetryingEmbedder::new(
            Flaky {
                calls: AtomicU32::new(0),
                failures: 10,
                retryable: true,
            },
            2,
        )
        .with_base_delay(Duration::from_millis(1));

        assert!(embedder.embed_one("hello").await.is_err());
        assert_eq!(embedder.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_skips_permanent_errors() {
        let embedder = RetryingEmbedder::new(
            Flaky {
                calls: AtomicU32::new(0),
                failures: 1,
                retryable: false,
            },
            5,
        )
        .with_base_delay(Duration::from_millis(1));

        assert!(embedder.embed_one("hello").await.is_err());
        assert_eq!(embedder.inner.calls.load(Ordering::SeqCst), 1);
    }
}
