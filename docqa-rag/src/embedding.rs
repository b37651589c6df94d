//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// The same provider must be used to build an index and to query it. The
/// pair ([`model_version`](EmbeddingProvider::model_version),
/// [`dimensions`](EmbeddingProvider::dimensions)) identifies the embedding
/// function; indexes record it and refuse to serve a different one.
///
/// Calls may be slow and may fail. Callers never hold an index lock while
/// awaiting them.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// sequentially for each input. Override this method if the backend
    /// supports native batch embedding for better throughput.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Version tag of the embedding function, recorded in persisted indexes.
    fn model_version(&self) -> &str;

    /// Short provider name used in errors and logs.
    fn name(&self) -> &str {
        "embedder"
    }
}

/// Check that a vector returned by `provider` has the advertised dimension
/// and only finite components.
///
/// # Errors
///
/// Returns [`RagError::EmbeddingError`] on a length mismatch or a NaN or
/// infinite component, since the capability returned something other than
/// what it promised.
pub fn check_embedding(provider: &dyn EmbeddingProvider, embedding: &[f32]) -> Result<()> {
    let expected = provider.dimensions();
    if embedding.len() != expected {
        return Err(RagError::EmbeddingError {
            provider: provider.name().to_string(),
            message: format!(
                "returned a vector of dimension {}, expected {expected}",
                embedding.len()
            ),
        });
    }
    if let Some(pos) = first_non_finite(embedding) {
        return Err(RagError::EmbeddingError {
            provider: provider.name().to_string(),
            message: format!("returned a non-finite value at component {pos}"),
        });
    }
    Ok(())
}

/// Position of the first NaN or infinite component, if any.
pub(crate) fn first_non_finite(embedding: &[f32]) -> Option<usize> {
    embedding.iter().position(|x| !x.is_finite())
}
