//! Configuration for chunking, retrieval and the engine as a whole.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// The unit in which window sizes and budgets are measured.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TextUnit {
    /// Unicode scalar values.
    #[default]
    Chars,
    /// Whitespace-delimited words.
    Tokens,
}

impl TextUnit {
    /// Measure `text` in this unit.
    pub fn measure(self, text: &str) -> usize {
        match self {
            TextUnit::Chars => text.chars().count(),
            TextUnit::Tokens => text.split_whitespace().count(),
        }
    }
}

/// Window and overlap used to cut pages into chunks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size, in `unit`.
    pub window: usize,
    /// Amount shared between consecutive chunks of a page, in `unit`.
    pub overlap: usize,
    pub unit: TextUnit,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { window: 1000, overlap: 200, unit: TextUnit::Chars }
    }
}

impl ChunkingConfig {
    /// Create a new builder for constructing a [`ChunkingConfig`].
    pub fn builder() -> ChunkingConfigBuilder {
        ChunkingConfigBuilder::default()
    }

    /// Check that the window is positive and larger than the overlap.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `window == 0` or `overlap >= window`.
    pub fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(RagError::ConfigError("chunk window must be greater than zero".to_string()));
        }
        if self.overlap >= self.window {
            return Err(RagError::ConfigError(format!(
                "chunk overlap ({}) must be less than chunk window ({})",
                self.overlap, self.window
            )));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`ChunkingConfig`].
#[derive(Debug, Clone, Default)]
pub struct ChunkingConfigBuilder {
    config: ChunkingConfig,
}

impl ChunkingConfigBuilder {
    /// Set the window size.
    pub fn window(mut self, window: usize) -> Self {
        self.config.window = window;
        self
    }

    /// Set the overlap between consecutive chunks.
    pub fn overlap(mut self, overlap: usize) -> Self {
        self.config.overlap = overlap;
        self
    }

    /// Set the unit used for window and overlap.
    pub fn unit(mut self, unit: TextUnit) -> Self {
        self.config.unit = unit;
        self
    }

    /// Build the [`ChunkingConfig`].
    ///
    /// # Errors
    ///
    /// See [`ChunkingConfig::validate`].
    pub fn build(self) -> Result<ChunkingConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Per-call retrieval parameters.
///
/// These are supplied with each query so one index can serve callers with
/// different precision/recall tradeoffs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalOptions {
    /// Maximum number of results.
    pub top_k: usize,
    /// Minimum score a result must reach to be kept.
    pub similarity_threshold: f32,
    /// Bound applied separately to the embedding call and to the search.
    pub timeout_ms: Option<u64>,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self { top_k: 5, similarity_threshold: 0.3, timeout_ms: None }
    }
}

impl RetrievalOptions {
    /// Options with the given `top_k` and threshold and no timeout.
    pub fn new(top_k: usize, similarity_threshold: f32) -> Self {
        Self { top_k, similarity_threshold, timeout_ms: None }
    }

    /// Set the per-stage timeout, rounded up to whole milliseconds.
    ///
    /// Durations under a millisecond, including zero, become 1 ms.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let millis = timeout.as_nanos().div_ceil(1_000_000).max(1);
        self.timeout_ms = Some(millis.try_into().unwrap_or(u64::MAX));
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `top_k == 0`, the threshold is
    /// not a finite number, or the timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.timeout_ms == Some(0) {
            return Err(RagError::ConfigError("timeout_ms must be greater than zero".to_string()));
        }
        if !self.similarity_threshold.is_finite() {
            return Err(RagError::ConfigError(format!(
                "similarity_threshold must be finite, got {}",
                self.similarity_threshold
            )));
        }
        Ok(())
    }
}

/// Settings a hosting application needs to run the retrieval engine.
///
/// Loadable from TOML:
///
/// ```toml
/// index_path = "vector_db/index.json"
/// embedder_version = "sentence-transformers/all-MiniLM-L6-v2"
/// context_budget = 3000
///
/// [chunking]
/// window = 1000
/// overlap = 200
/// unit = "chars"
///
/// [retrieval]
/// top_k = 5
/// similarity_threshold = 0.3
/// timeout_ms = 2000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    pub chunking: ChunkingConfig,
    /// Default options for callers that do not choose their own.
    pub retrieval: RetrievalOptions,
    /// Maximum size of the assembled context block, in `context_unit`.
    pub context_budget: usize,
    pub context_unit: TextUnit,
    /// Where the index is persisted.
    pub index_path: PathBuf,
    /// Version tag of the embedding function the index is built with.
    pub embedder_version: String,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalOptions::default(),
            context_budget: 3000,
            context_unit: TextUnit::Chars,
            index_path: PathBuf::from("vector_db/index.json"),
            embedder_version: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: RagConfig = toml::from_str(source)
            .map_err(|e| RagError::ConfigError(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            RagError::ConfigError(format!("cannot read configuration {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }

    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if any nested section is invalid,
    /// the context budget is zero, or the embedder version tag is empty.
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        self.retrieval.validate()?;
        if self.context_budget == 0 {
            return Err(RagError::ConfigError(
                "context_budget must be greater than zero".to_string(),
            ));
        }
        if self.embedder_version.trim().is_empty() {
            return Err(RagError::ConfigError("embedder_version must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    pub fn chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.config.chunking = chunking;
        self
    }

    pub fn retrieval(mut self, retrieval: RetrievalOptions) -> Self {
        self.config.retrieval = retrieval;
        self
    }

    /// Set the assembled context budget and the unit it is measured in.
    pub fn context_budget(mut self, budget: usize, unit: TextUnit) -> Self {
        self.config.context_budget = budget;
        self.config.context_unit = unit;
        self
    }

    pub fn index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.index_path = path.into();
        self
    }

    pub fn embedder_version(mut self, version: impl Into<String>) -> Self {
        self.config.embedder_version = version.into();
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
