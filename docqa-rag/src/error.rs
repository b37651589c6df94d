//! Error types for the `docqa-rag` crate.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in retrieval operations.
///
/// Structural errors ([`ConfigError`](RagError::ConfigError),
/// [`DimensionMismatch`](RagError::DimensionMismatch),
/// [`IndexVersionMismatch`](RagError::IndexVersionMismatch)) indicate a setup
/// bug and must abort the operation. Query-time failures
/// ([`IndexUnavailable`](RagError::IndexUnavailable),
/// [`EmbeddingError`](RagError::EmbeddingError),
/// [`RetrievalTimeout`](RagError::RetrievalTimeout)) are recoverable: callers
/// degrade to an ungrounded response. See [`RagError::is_recoverable`].
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid chunking, retrieval or engine parameters.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An embedding's length differs from the index dimension.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The dimension fixed for the index.
        expected: usize,
        /// The length of the offending vector.
        actual: usize,
    },

    /// The persisted index is missing or corrupt.
    #[error("Index unavailable at {}: {reason}", path.display())]
    IndexUnavailable {
        /// Location of the persisted index.
        path: PathBuf,
        /// What made the index unusable.
        reason: String,
    },

    /// The index was produced by a different embedding function version.
    #[error("Index version mismatch: embedder is '{expected}', index was built with '{found}'")]
    IndexVersionMismatch {
        /// The version tag of the configured embedder.
        expected: String,
        /// The version tag recorded in the index.
        found: String,
    },

    /// The embedding capability failed or returned an unusable vector.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A bounded wait was exceeded.
    #[error("Retrieval timed out during {stage} after {timeout:?}")]
    RetrievalTimeout {
        /// The stage that timed out (`"embed"` or `"search"`).
        stage: &'static str,
        /// The configured bound.
        timeout: Duration,
    },

    /// An embedding holds a NaN or infinite component.
    #[error("Invalid embedding: {0}")]
    InvalidEmbedding(String),

    /// Two entries of one build share a chunk identifier.
    #[error("Duplicate chunk id in index build: {0}")]
    DuplicateChunk(String),

    /// The chunker produced chunks that do not cover their page.
    #[error("Chunking error: {0}")]
    ChunkingError(String),

    /// Writing the index to durable storage failed.
    #[error("Storage error at {}: {message}", path.display())]
    StorageError {
        /// Target location.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// An error in pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

impl RagError {
    /// Whether a query-time caller may degrade to an ungrounded response
    /// instead of failing.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RagError::IndexUnavailable { .. }
                | RagError::EmbeddingError { .. }
                | RagError::RetrievalTimeout { .. }
        )
    }
}

/// A convenience result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RagError>;
