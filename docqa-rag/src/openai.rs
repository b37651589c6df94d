//! Query and chunk embeddings from the OpenAI `/v1/embeddings` endpoint.
//!
//! Available with the `openai` feature. Every failure (transport, HTTP
//! status, malformed body, unusable vector) surfaces as
//! [`RagError::EmbeddingError`], so a query-time caller can degrade instead
//! of aborting.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::embedding::{EmbeddingProvider, check_embedding};
use crate::error::{RagError, Result};

const EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_MODEL: &str = "text-embedding-3-small";
const DEFAULT_DIMENSIONS: usize = 1536;

/// Most inputs the endpoint accepts in one request.
pub const MAX_INPUTS_PER_REQUEST: usize = 2048;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PROVIDER: &str = "openai";

/// An [`EmbeddingProvider`] backed by the OpenAI embeddings API.
///
/// The version tag is `"{model}@{dimensions}"`, so an index built with one
/// model or Matryoshka size refuses to serve another.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::from_env()?.with_dimensions(384);
/// let config = RagConfig::builder().embedder_version(provider.model_version()).build()?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dimensions: usize,
    /// Sent to the API only when the caller overrides the model's size.
    request_dimensions: Option<usize>,
    max_batch: usize,
    version: String,
}

impl std::fmt::Debug for OpenAIEmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIEmbeddingProvider")
            .field("endpoint", &self.endpoint)
            .field("version", &self.version)
            .field("max_batch", &self.max_batch)
            .finish_non_exhaustive()
    }
}

impl OpenAIEmbeddingProvider {
    /// Provider for `text-embedding-3-small` at 1536 dimensions.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(embedding_error("API key must not be empty"));
        }
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| embedding_error(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: EMBEDDINGS_URL.to_string(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
            dimensions: DEFAULT_DIMENSIONS,
            request_dimensions: None,
            max_batch: MAX_INPUTS_PER_REQUEST,
            version: version_tag(DEFAULT_MODEL, DEFAULT_DIMENSIONS),
        })
    }

    /// Provider keyed by `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| embedding_error("OPENAI_API_KEY is not set"))?;
        Self::new(api_key)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self.version = version_tag(&self.model, self.dimensions);
        self
    }

    /// Ask the API for vectors truncated to `dimensions`.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self.request_dimensions = Some(dimensions);
        self.version = version_tag(&self.model, self.dimensions);
        self
    }

    /// Send at most `max_batch` inputs per request, capped at
    /// [`MAX_INPUTS_PER_REQUEST`].
    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch.clamp(1, MAX_INPUTS_PER_REQUEST);
        self
    }

    /// Point at an OpenAI-compatible endpoint (a proxy or gateway).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// One request for at most `max_batch` inputs.
    async fn request(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: inputs,
            dimensions: self.request_dimensions,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(provider = PROVIDER, %status, "embedding request rejected");
            return Err(status_error(status, &text));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| embedding_error(format!("unreadable response body: {e}")))?;
        self.collect(parsed, inputs.len())
    }

    /// Order vectors by input position and check each one.
    fn collect(&self, response: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
        if response.data.len() != expected {
            return Err(embedding_error(format!(
                "got {} vectors for {expected} inputs",
                response.data.len()
            )));
        }
        let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
        for item in response.data {
            let slot = slots
                .get_mut(item.index)
                .ok_or_else(|| embedding_error(format!("vector index {} out of range", item.index)))?;
            if slot.replace(item.embedding).is_some() {
                return Err(embedding_error(format!("vector index {} repeated", item.index)));
            }
        }
        slots
            .into_iter()
            .map(|slot| {
                let vector = slot.ok_or_else(|| embedding_error("missing vector in response"))?;
                check_embedding(self, &vector)?;
                Ok(vector)
            })
            .collect()
    }
}

fn version_tag(model: &str, dimensions: usize) -> String {
    format!("{model}@{dimensions}")
}

fn embedding_error(message: impl Into<String>) -> RagError {
    RagError::EmbeddingError { provider: PROVIDER.to_string(), message: message.into() }
}

fn transport_error(e: reqwest::Error) -> RagError {
    let kind = if e.is_timeout() {
        "timed out"
    } else if e.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    warn!(provider = PROVIDER, error = %e, kind, "embedding transport error");
    embedding_error(format!("{kind}: {e}"))
}

fn status_error(status: reqwest::StatusCode, body: &str) -> RagError {
    let detail = serde_json::from_str::<ApiError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string());
    embedding_error(format!("HTTP {status}: {detail}"))
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.request(&[text]).await?;
        vectors.pop().ok_or_else(|| embedding_error("no vector for query"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for (n, batch) in texts.chunks(self.max_batch).enumerate() {
            debug!(provider = PROVIDER, request = n, inputs = batch.len(), "embedding batch");
            vectors.extend(self.request(batch).await?);
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_version(&self) -> &str {
        &self.version
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}
