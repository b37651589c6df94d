//! Retrieval pipeline orchestrator.
//!
//! The [`RagPipeline`] composes a [`Chunker`], an [`EmbeddingProvider`], a
//! [`VectorStore`], a [`Retriever`] and a [`ContextAssembler`] into the two
//! workflows a question-answering host needs: ingestion (chunk → embed →
//! index) and grounding (retrieve → assemble).
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{Grounding, RagConfig, RagPipeline, RetrievalOptions};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .build()?;
//!
//! pipeline.ingest(&document).await?;
//! match pipeline.ground("What is HbE disease?", &RetrievalOptions::new(5, 0.3)).await? {
//!     Grounding::Grounded(context) => generate(&context.block, &context.citations),
//!     Grounding::Ungrounded(reason) => generate_ungrounded(reason),
//! }
//! ```

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::chunking::{Chunker, WindowChunker};
use crate::config::{RagConfig, RetrievalOptions};
use crate::context::{AssembledContext, ContextAssembler};
use crate::document::{Chunk, Document, RetrievedContext};
use crate::embedding::{EmbeddingProvider, check_embedding};
use crate::error::{RagError, Result};
use crate::inmemory::InMemoryVectorIndex;
use crate::persistence;
use crate::retriever::Retriever;
use crate::vectorstore::{IndexEntry, VectorStore};

/// Notice handed to the generation step when no grounding was found.
pub const NO_GROUNDING_NOTICE: &str = "No relevant information found in the reference material.";

/// Why a query ended up without grounding.
#[derive(Debug)]
pub enum UngroundedReason {
    /// Nothing in the index cleared the similarity threshold.
    NoRelevantChunks,
    /// Chunks were retrieved but not even the best one fit the context budget.
    OverBudget,
    /// A recoverable failure: index unavailable, embedder failure or timeout.
    Degraded(RagError),
}

/// Outcome of [`RagPipeline::ground`].
#[derive(Debug)]
pub enum Grounding {
    Grounded(AssembledContext),
    Ungrounded(UngroundedReason),
}

impl Grounding {
    pub fn is_grounded(&self) -> bool {
        matches!(self, Grounding::Grounded(_))
    }

    /// The text to place in front of the generation step.
    pub fn context_text(&self) -> &str {
        match self {
            Grounding::Grounded(context) => &context.block,
            Grounding::Ungrounded(_) => NO_GROUNDING_NOTICE,
        }
    }
}

/// The retrieval pipeline orchestrator.
///
/// Construct one via [`RagPipeline::builder()`] or load a persisted index with
/// [`RagPipeline::open`].
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
    retriever: Retriever,
    assembler: ContextAssembler,
}

impl std::fmt::Debug for RagPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagPipeline")
            .field("config", &self.config)
            .field("retriever", &self.retriever)
            .field("assembler", &self.assembler)
            .finish_non_exhaustive()
    }
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Build a pipeline over the index persisted at `config.index_path`.
    ///
    /// # Errors
    ///
    /// [`RagError::IndexUnavailable`] if the index is missing or corrupt and
    /// [`RagError::IndexVersionMismatch`] if it was built by another embedder.
    pub async fn open(
        config: RagConfig,
        embedding_provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let path = config.index_path.clone();
        let version = config.embedder_version.clone();
        let index = tokio::task::spawn_blocking(move || persistence::load(&path, &version))
            .await
            .map_err(|e| RagError::PipelineError(format!("index load task failed: {e}")))??;

        Self::builder()
            .config(config)
            .embedding_provider(embedding_provider)
            .vector_store(Arc::new(index))
            .build()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn assembler(&self) -> &ContextAssembler {
        &self.assembler
    }

    /// Chunk and embed `document` without touching the index.
    async fn prepare(&self, document: &Document) -> Result<Vec<IndexEntry>> {
        let chunks = self.chunker.chunk(document)?;
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
            error!(document.id = %document.id, error = %e, "embedding failed during ingestion");
            e
        })?;
        if embeddings.len() != chunks.len() {
            return Err(RagError::EmbeddingError {
                provider: self.embedding_provider.name().to_string(),
                message: format!(
                    "returned {} embeddings for {} chunks of document '{}'",
                    embeddings.len(),
                    chunks.len(),
                    document.id
                ),
            });
        }
        for embedding in &embeddings {
            check_embedding(self.embedding_provider.as_ref(), embedding)?;
        }

        Ok(chunks.into_iter().zip(embeddings).map(|(c, e)| IndexEntry::new(c, e)).collect())
    }

    /// Ingest (or re-ingest) a single document: chunk → embed → replace.
    ///
    /// The document's previous chunks and the new ones are swapped in one
    /// index generation. Nothing changes if chunking or embedding fails.
    ///
    /// Returns the chunks now indexed for the document.
    pub async fn ingest(&self, document: &Document) -> Result<Vec<Chunk>> {
        let entries = self.prepare(document).await?;
        let chunks: Vec<Chunk> = entries.iter().map(|e| e.chunk.clone()).collect();
        self.vector_store.replace_document(&document.id, entries).map_err(|e| {
            error!(document.id = %document.id, error = %e, "index update failed during ingestion");
            e
        })?;
        info!(document.id = %document.id, chunk_count = chunks.len(), "ingested document");
        Ok(chunks)
    }

    /// Remove every chunk of `document_id` from the index.
    pub fn remove(&self, document_id: &str) -> Result<usize> {
        self.vector_store.delete_by_document(document_id)
    }

    /// Replace the whole index with the chunks of `documents`.
    ///
    /// All documents are chunked and embedded before the index is touched;
    /// readers keep using the old generation until the new one is complete.
    ///
    /// Returns the number of chunks in the new generation.
    pub async fn rebuild(&self, documents: &[Document]) -> Result<usize> {
        let mut entries = Vec::new();
        for document in documents {
            entries.extend(self.prepare(document).await?);
        }
        let chunk_count = entries.len();
        self.vector_store.build(entries)?;
        info!(documents = documents.len(), chunk_count, "rebuilt index");
        Ok(chunk_count)
    }

    /// Retrieve ranked, thresholded results for `query`.
    pub async fn retrieve(&self, query: &str, options: &RetrievalOptions) -> Result<RetrievedContext> {
        self.retriever.retrieve(query, options).await
    }

    /// Retrieve and assemble grounding for `query`.
    ///
    /// Recoverable failures and empty retrievals become
    /// [`Grounding::Ungrounded`]; structural errors are returned.
    pub async fn ground(&self, query: &str, options: &RetrievalOptions) -> Result<Grounding> {
        let retrieved = match self.retriever.retrieve(query, options).await {
            Ok(retrieved) => retrieved,
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "retrieval degraded, answering without grounding");
                return Ok(Grounding::Ungrounded(UngroundedReason::Degraded(e)));
            }
            Err(e) => return Err(e),
        };

        if retrieved.is_empty() {
            info!("no chunk cleared the similarity threshold");
            return Ok(Grounding::Ungrounded(UngroundedReason::NoRelevantChunks));
        }

        let assembled = self.assembler.assemble(&retrieved);
        if assembled.is_empty() {
            warn!(
                retrieved = retrieved.len(),
                budget = self.assembler.budget(),
                "no retrieved chunk fits the context budget"
            );
            return Ok(Grounding::Ungrounded(UngroundedReason::OverBudget));
        }
        Ok(Grounding::Grounded(assembled))
    }

    /// Persist the current index generation to `config.index_path`.
    pub async fn persist(&self) -> Result<()> {
        let store = Arc::clone(&self.vector_store);
        let path = self.config.index_path.clone();
        tokio::task::spawn_blocking(move || persistence::persist(store.as_ref(), &path))
            .await
            .map_err(|e| RagError::PipelineError(format!("index persist task failed: {e}")))?
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `config` and `embedding_provider` are required. Without an explicit
/// chunker a [`WindowChunker`] is built from `config.chunking`; without a
/// vector store an empty [`InMemoryVectorIndex`] is created for the
/// provider's dimension and version.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Build the [`RagPipeline`], validating that all parts agree.
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigError`] if a required field is missing or the
    ///   configuration is invalid.
    /// - [`RagError::IndexVersionMismatch`] if the configured embedder version,
    ///   the provider and the vector store disagree.
    /// - [`RagError::DimensionMismatch`] if the provider and store dimensions differ.
    pub fn build(self) -> Result<RagPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;

        if embedding_provider.model_version() != config.embedder_version {
            return Err(RagError::IndexVersionMismatch {
                expected: config.embedder_version.clone(),
                found: embedding_provider.model_version().to_string(),
            });
        }

        let vector_store: Arc<dyn VectorStore> = match self.vector_store {
            Some(store) => store,
            None => Arc::new(InMemoryVectorIndex::new(
                embedding_provider.dimensions(),
                embedding_provider.model_version(),
            )),
        };
        let chunker: Arc<dyn Chunker> = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(WindowChunker::new(config.chunking.clone())?),
        };
        let retriever = Retriever::new(Arc::clone(&embedding_provider), Arc::clone(&vector_store))?;
        let assembler = ContextAssembler::new(config.context_budget, config.context_unit)?;

        Ok(RagPipeline {
            config,
            embedding_provider,
            vector_store,
            chunker,
            retriever,
            assembler,
        })
    }
}
