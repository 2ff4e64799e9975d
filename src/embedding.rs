//! Embedding provider seam.
//!
//! Everything that turns text into vectors sits behind [`EmbeddingProvider`]:
//! the index builder embeds chunk batches through it, the retriever embeds
//! queries through it, and tests swap in [`MockEmbeddingProvider`] for
//! deterministic, network-free runs.
//!
//! A provider declares its `model_id` and `dimension` up front. The vector
//! index records both at build time and refuses to serve queries embedded
//! with a different model, so a provider swap forces a rebuild instead of
//! silently returning garbage neighbors.

use async_trait::async_trait;
use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

/// Errors from embedding providers.
#[derive(Debug, Error, Diagnostic)]
pub enum EmbeddingError {
    /// The provider endpoint answered with a non-success status.
    #[error("embedding endpoint returned {status}: {message}")]
    #[diagnostic(code(switchboard::embedding::http))]
    Http { status: u16, message: String },

    /// The request never completed (connect failure, timeout, TLS).
    #[error("embedding transport error: {0}")]
    #[diagnostic(
        code(switchboard::embedding::transport),
        help("Check the embedding endpoint URL and network reachability.")
    )]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered 2xx but the body was not the expected shape.
    #[error("malformed embedding response: {0}")]
    #[diagnostic(code(switchboard::embedding::malformed_response))]
    MalformedResponse(String),

    /// A returned vector did not match the provider's declared dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    #[diagnostic(
        code(switchboard::embedding::dimension_mismatch),
        help("The configured dimension must match what the model actually emits.")
    )]
    DimensionMismatch { expected: usize, got: usize },

    /// The endpoint returned a different number of vectors than inputs.
    #[error("embedding batch shape mismatch: sent {requested} inputs, got {returned} vectors")]
    #[diagnostic(code(switchboard::embedding::batch_shape))]
    BatchShape { requested: usize, returned: usize },
}

/// Turns text into fixed-dimension vectors.
///
/// Implementations must be deterministic per `(model_id, input)` as far as
/// the backing model allows; the index builder relies on `model_id` and
/// `dimension` staying constant for the provider's lifetime.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier of the backing model (recorded in index metadata).
    fn model_id(&self) -> &str;

    /// Dimension of every vector this provider emits.
    fn dimension(&self) -> usize;

    /// Embed a batch of inputs, one vector per input, in input order.
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single input. Default implementation delegates to
    /// [`embed_batch`](Self::embed_batch).
    async fn embed_one(&self, input: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_batch(&[input.to_string()]).await?;
        vectors.pop().ok_or(EmbeddingError::BatchShape {
            requested: 1,
            returned: 0,
        })
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// Embedding provider backed by an OpenAI-compatible `/embeddings` endpoint.
///
/// # Examples
///
/// ```rust,no_run
/// use switchboard::embedding::HttpEmbeddingProvider;
///
/// let provider = HttpEmbeddingProvider::new(
///     "https://api.openai.com/v1",
///     "sk-...",
///     "text-embedding-3-small",
///     1536,
/// );
/// ```
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimension: usize,
}

impl HttpEmbeddingProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            dimension,
        }
    }

    /// Use a preconfigured client (timeouts, proxies).
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        tracing::debug!(batch = inputs.len(), model = %self.model, "embedding batch");

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "input": inputs,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::MalformedResponse(e.to_string()))?;

        if parsed.data.len() != inputs.len() {
            return Err(EmbeddingError::BatchShape {
                requested: inputs.len(),
                returned: parsed.data.len(),
            });
        }

        let mut vectors = Vec::with_capacity(parsed.data.len());
        for datum in parsed.data {
            if datum.embedding.len() != self.dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimension,
                    got: datum.embedding.len(),
                });
            }
            vectors.push(datum.embedding);
        }
        Ok(vectors)
    }
}

/// Deterministic, network-free embedding provider for tests.
///
/// Each input is hashed to a seed, the seed drives a small PRNG that fills
/// the vector, and the vector is normalized to unit length so cosine
/// similarity behaves sensibly (identical text scores 1.0 against itself).
///
/// # Examples
///
/// ```rust
/// use switchboard::embedding::{EmbeddingProvider, MockEmbeddingProvider};
///
/// let provider = MockEmbeddingProvider::new().with_dimension(32);
/// assert_eq!(provider.dimension(), 32);
/// assert_eq!(provider.model_id(), "mock-embedder");
/// ```
#[derive(Clone, Debug)]
pub struct MockEmbeddingProvider {
    model_id: String,
    dimension: usize,
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self {
            model_id: "mock-embedder".to_string(),
            dimension: 64,
        }
    }
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the vector dimension (default 64).
    #[must_use]
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension.max(1);
        self
    }

    /// Override the reported model id (default `"mock-embedder"`).
    ///
    /// Handy for exercising model-mismatch rejection.
    #[must_use]
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    fn embed_text(&self, input: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};

        let mut hasher = rustc_hash::FxHasher::default();
        input.hash(&mut hasher);
        self.model_id.hash(&mut hasher);
        let mut state = hasher.finish() | 1;

        let mut vector: Vec<f32> = (0..self.dimension)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                let unit = (state >> 40) as f32 / (1u64 << 24) as f32;
                unit * 2.0 - 1.0
            })
            .collect();

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(inputs.iter().map(|text| self.embed_text(text)).collect())
    }
}
