//! Vector store trait for storing and searching chunk embeddings.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::document::{Chunk, QueryResult};
use crate::error::Result;

/// A chunk paired with its embedding, the unit stored in an index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

impl IndexEntry {
    pub fn new(chunk: Chunk, embedding: Vec<f32>) -> Self {
        Self { chunk, embedding }
    }
}

/// The authoritative mapping from chunk id to (chunk, embedding).
///
/// Every index has a fixed dimension and embedder version tag. Readers see
/// one immutable generation at a time; each successful mutation publishes a
/// new generation in a single step and a failed mutation publishes nothing.
///
/// `search` is defined only by its results, so implementations are free to
/// scan linearly or consult an approximate structure.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{InMemoryVectorIndex, VectorStore};
///
/// let index = InMemoryVectorIndex::new(384, "all-MiniLM-L6-v2");
/// index.build(entries)?;
/// let results = index.search(&query_embedding, 5)?;
/// ```
pub trait VectorStore: Send + Sync {
    /// The embedding dimension every entry and query must have.
    fn dimension(&self) -> usize;

    /// Version tag of the embedding function the index was built with.
    fn embedder_version(&self) -> &str;

    /// Number of the generation currently visible to readers.
    fn generation(&self) -> u64;

    /// Number of entries currently indexed.
    fn count(&self) -> usize;

    /// Identifiers of the documents that own at least one entry.
    fn document_ids(&self) -> BTreeSet<String>;

    /// Replace the entire contents with `entries`.
    ///
    /// Fails without changing the index if any embedding has the wrong
    /// dimension or two entries share a chunk id.
    fn build(&self, entries: Vec<IndexEntry>) -> Result<()>;

    /// Insert or overwrite one entry keyed by its chunk id.
    fn upsert(&self, chunk: Chunk, embedding: Vec<f32>) -> Result<()>;

    /// Remove every entry owned by `document_id`, returning how many went.
    fn delete_by_document(&self, document_id: &str) -> Result<usize>;

    /// Drop the document's entries and insert `entries` in one generation.
    fn replace_document(&self, document_id: &str, entries: Vec<IndexEntry>) -> Result<()>;

    /// The `top_k` entries most similar to `query`.
    ///
    /// Ordered by descending score, ties by ascending chunk id. An empty index
    /// yields an empty result.
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<QueryResult>>;

    /// Every entry of the current generation, ordered by chunk id.
    fn entries(&self) -> Vec<IndexEntry>;

    /// The current generation number together with its entries, both read
    /// from the same snapshot.
    fn entries_with_generation(&self) -> (u64, Vec<IndexEntry>);
}
