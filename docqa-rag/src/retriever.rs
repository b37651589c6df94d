//! Ranked retrieval: query text in, thresholded [`RetrievedContext`] out.
//!
//! The [`Retriever`] embeds the query, searches the index and keeps the
//! results that clear the caller's threshold. `top_k`, threshold and timeout
//! come with every call. No index lock is held while the embedder runs; the
//! search itself runs on the blocking pool against a generation snapshot so
//! that the timeout can bound it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::RetrievalOptions;
use crate::document::{QueryResult, RetrievedContext};
use crate::embedding::{EmbeddingProvider, check_embedding};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// Turns free-text queries into ranked, thresholded results.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{RetrievalOptions, Retriever};
///
/// let retriever = Retriever::new(embedder, index)?;
/// let context = retriever.retrieve("What is HbE disease?", &RetrievalOptions::new(5, 0.3)).await?;
/// if context.is_empty() {
///     // insufficient grounding
/// }
/// ```
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorStore>,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("embedder", &self.embedder.model_version())
            .field("dimension", &self.index.dimension())
            .finish()
    }
}

impl Retriever {
    /// Pair an embedder with an index built by the same embedding function.
    ///
    /// # Errors
    ///
    /// - [`RagError::IndexVersionMismatch`] if the index was built with a
    ///   different embedder version.
    /// - [`RagError::DimensionMismatch`] if the embedder's dimension differs
    ///   from the index dimension.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorStore>) -> Result<Self> {
        if embedder.model_version() != index.embedder_version() {
            return Err(RagError::IndexVersionMismatch {
                expected: embedder.model_version().to_string(),
                found: index.embedder_version().to_string(),
            });
        }
        if embedder.dimensions() != index.dimension() {
            return Err(RagError::DimensionMismatch {
                expected: index.dimension(),
                actual: embedder.dimensions(),
            });
        }
        Ok(Self { embedder, index })
    }

    pub fn index(&self) -> &Arc<dyn VectorStore> {
        &self.index
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Retrieve the results for `query` scoring at least
    /// `options.similarity_threshold`, at most `options.top_k` of them, in
    /// ranking order.
    ///
    /// An empty index or a query nothing clears yields an empty context, not
    /// an error.
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigError`] for invalid options.
    /// - [`RagError::EmbeddingError`] if the embedder fails or returns a vector
    ///   of the wrong dimension.
    /// - [`RagError::RetrievalTimeout`] if embedding or search exceeds
    ///   `options.timeout()`.
    pub async fn retrieve(&self, query: &str, options: &RetrievalOptions) -> Result<RetrievedContext> {
        options.validate()?;
        let timeout = options.timeout();

        let embedding = bounded("embed", timeout, self.embedder.embed(query)).await?.map_err(|e| {
            debug!(error = %e, "query embedding failed");
            e
        })?;
        check_embedding(self.embedder.as_ref(), &embedding)?;

        let index = Arc::clone(&self.index);
        let top_k = options.top_k;
        let search = tokio::task::spawn_blocking(move || index.search(&embedding, top_k));
        let results = bounded("search", timeout, search)
            .await?
            .map_err(|e| RagError::PipelineError(format!("search task failed: {e}")))??;

        let candidates = results.len();
        let context = apply_threshold(results, options.similarity_threshold);
        debug!(candidates, top_k, threshold = options.similarity_threshold, "filtered results");
        info!(result_count = context.len(), "retrieval completed");
        Ok(context)
    }
}

/// Keep the results scoring at least `threshold`, preserving their order.
pub fn apply_threshold(results: Vec<QueryResult>, threshold: f32) -> RetrievedContext {
    RetrievedContext::new(results.into_iter().filter(|r| r.score >= threshold).collect())
}

/// Await `fut`, failing with [`RagError::RetrievalTimeout`] after `timeout`.
async fn bounded<F: Future>(
    stage: &'static str,
    timeout: Option<Duration>,
    fut: F,
) -> Result<F::Output> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            debug!(stage, timeout_ms = limit.as_millis() as u64, "retrieval stage timed out");
            RagError::RetrievalTimeout { stage, timeout: limit }
        }),
        None => Ok(fut.await),
    }
}
