//! # docqa-rag
//!
//! Retrieval engine for grounded document question answering.
//!
//! Documents arrive as ordered page texts from an external extraction step.
//! They are cut into overlapping chunks, embedded by an
//! [`EmbeddingProvider`], and stored in a [`VectorStore`]. At query time the
//! [`Retriever`] embeds the question, ranks chunks by cosine similarity and
//! drops those under the caller's threshold; the [`ContextAssembler`] turns
//! what is left into a bounded, `[n]`-annotated text block plus citations for
//! the generation step.
//!
//! ## Features
//!
//! - `openai`: [`openai::OpenAIEmbeddingProvider`] backed by the OpenAI embeddings API
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docqa_rag::{Document, Grounding, RagConfig, RagPipeline, RetrievalOptions};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(embedder))
//!     .build()?;
//!
//! pipeline.ingest(&Document::new("manual").with_page(1, "...")).await?;
//! let grounding = pipeline.ground("question", &RetrievalOptions::new(5, 0.3)).await?;
//! ```

pub mod chunking;
pub mod config;
pub mod context;
pub mod document;
pub mod embedding;
pub mod error;
pub mod inmemory;
pub mod persistence;
pub mod pipeline;
pub mod retriever;
pub mod vectorstore;

#[cfg(feature = "openai")]
pub mod openai;

pub use chunking::{Chunker, WindowChunker, verify_coverage};
pub use config::{ChunkingConfig, RagConfig, RetrievalOptions, TextUnit};
pub use context::{AssembledContext, Citation, ContextAssembler};
pub use document::{Chunk, Document, Page, QueryResult, RetrievedContext, chunk_id};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use inmemory::InMemoryVectorIndex;
pub use pipeline::{Grounding, NO_GROUNDING_NOTICE, RagPipeline, RagPipelineBuilder, UngroundedReason};
pub use retriever::Retriever;
pub use vectorstore::{IndexEntry, VectorStore};
