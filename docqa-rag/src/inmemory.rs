//! In-memory vector index using cosine similarity.
//!
//! [`InMemoryVectorIndex`] keeps the current generation behind an
//! `Arc` that readers clone under a momentary read lock. Writers are
//! serialized by a separate mutex, assemble the next generation without
//! holding the reader lock, and publish it by swapping the `Arc`. An
//! in-flight search therefore runs entirely against the generation it
//! started with.
//!
//! Search is a brute-force scan; at tens of thousands of chunks that is both
//! exact and fast enough.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::document::{Chunk, QueryResult};
use crate::embedding::first_non_finite;
use crate::error::{RagError, Result};
use crate::persistence;
use crate::vectorstore::{IndexEntry, VectorStore};

/// An entry with its precomputed L2 norm.
#[derive(Debug)]
struct StoredEntry {
    chunk: Chunk,
    embedding: Vec<f32>,
    norm: f32,
}

impl StoredEntry {
    fn new(entry: IndexEntry) -> Self {
        let norm = l2_norm(&entry.embedding);
        Self { chunk: entry.chunk, embedding: entry.embedding, norm }
    }
}

/// One immutable snapshot of the index contents.
#[derive(Debug, Default)]
struct Generation {
    number: u64,
    entries: BTreeMap<String, Arc<StoredEntry>>,
}

/// An in-memory vector index with generation swapping.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{InMemoryVectorIndex, VectorStore};
///
/// let index = InMemoryVectorIndex::new(384, "all-MiniLM-L6-v2");
/// index.upsert(chunk, embedding)?;
/// ```
#[derive(Debug)]
pub struct InMemoryVectorIndex {
    dimension: usize,
    embedder_version: String,
    current: RwLock<Arc<Generation>>,
    writer: Mutex<()>,
}

impl InMemoryVectorIndex {
    /// Create an empty index for embeddings of `dimension` produced by the
    /// embedding function tagged `embedder_version`.
    pub fn new(dimension: usize, embedder_version: impl Into<String>) -> Self {
        Self {
            dimension,
            embedder_version: embedder_version.into(),
            current: RwLock::new(Arc::new(Generation::default())),
            writer: Mutex::new(()),
        }
    }

    /// Load a persisted index, checking it against `embedder_version`.
    ///
    /// # Errors
    ///
    /// [`RagError::IndexUnavailable`] if the file is missing or corrupt,
    /// [`RagError::IndexVersionMismatch`] if it was built by another embedder.
    pub fn load(path: impl AsRef<Path>, embedder_version: &str) -> Result<Self> {
        persistence::load(path.as_ref(), embedder_version)
    }

    /// Write the current generation to `path`.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        persistence::persist(self, path.as_ref())
    }

    /// Build an index from entries already checked by the loader.
    pub(crate) fn from_entries(
        dimension: usize,
        embedder_version: impl Into<String>,
        entries: Vec<IndexEntry>,
    ) -> Result<Self> {
        let index = Self::new(dimension, embedder_version);
        index.build(entries)?;
        Ok(index)
    }

    fn snapshot(&self) -> Arc<Generation> {
        self.current.read().clone()
    }

    /// Reject vectors of the wrong length or with NaN/infinite components.
    fn check_vector(&self, embedding: &[f32], owner: &str) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        if let Some(pos) = first_non_finite(embedding) {
            return Err(RagError::InvalidEmbedding(format!(
                "{owner} has a non-finite value at component {pos}"
            )));
        }
        Ok(())
    }

    /// Apply `mutate` to a copy of the current entries and publish the result.
    ///
    /// Must be called with the writer lock held.
    fn commit<R>(
        &self,
        mutate: impl FnOnce(&mut BTreeMap<String, Arc<StoredEntry>>) -> Result<R>,
    ) -> Result<(R, u64)> {
        let base = self.snapshot();
        let mut entries = base.entries.clone();
        let out = mutate(&mut entries)?;
        let number = self.publish(base.number, entries);
        Ok((out, number))
    }

    fn publish(&self, previous: u64, entries: BTreeMap<String, Arc<StoredEntry>>) -> u64 {
        let next = Arc::new(Generation { number: previous + 1, entries });
        let number = next.number;
        *self.current.write() = next;
        number
    }

    fn stored(&self, entries: Vec<IndexEntry>) -> Result<Vec<Arc<StoredEntry>>> {
        entries
            .into_iter()
            .map(|entry| {
                self.check_vector(&entry.embedding, &entry.chunk.id)?;
                Ok(Arc::new(StoredEntry::new(entry)))
            })
            .collect()
    }
}

impl VectorStore for InMemoryVectorIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embedder_version(&self) -> &str {
        &self.embedder_version
    }

    fn generation(&self) -> u64 {
        self.snapshot().number
    }

    fn count(&self) -> usize {
        self.snapshot().entries.len()
    }

    fn document_ids(&self) -> BTreeSet<String> {
        self.snapshot().entries.values().map(|e| e.chunk.document_id.clone()).collect()
    }

    fn build(&self, entries: Vec<IndexEntry>) -> Result<()> {
        let stored = self.stored(entries)?;
        let mut map = BTreeMap::new();
        for entry in stored {
            let id = entry.chunk.id.clone();
            if map.insert(id.clone(), entry).is_some() {
                return Err(RagError::DuplicateChunk(id));
            }
        }

        let chunk_count = map.len();
        let _writer = self.writer.lock();
        let previous = self.snapshot().number;
        let generation = self.publish(previous, map);
        info!(generation, chunk_count, "built index generation");
        Ok(())
    }

    fn upsert(&self, chunk: Chunk, embedding: Vec<f32>) -> Result<()> {
        self.check_vector(&embedding, &chunk.id)?;
        let entry = Arc::new(StoredEntry::new(IndexEntry::new(chunk, embedding)));
        let chunk_id = entry.chunk.id.clone();

        let _writer = self.writer.lock();
        let ((), generation) = self.commit(|entries| {
            entries.insert(entry.chunk.id.clone(), entry);
            Ok(())
        })?;
        debug!(chunk.id = %chunk_id, generation, "upserted chunk");
        Ok(())
    }

    fn delete_by_document(&self, document_id: &str) -> Result<usize> {
        let _writer = self.writer.lock();
        if !self.snapshot().entries.values().any(|e| e.chunk.document_id == document_id) {
            return Ok(0);
        }
        let (removed, generation) = self.commit(|entries| {
            let before = entries.len();
            entries.retain(|_, e| e.chunk.document_id != document_id);
            Ok(before - entries.len())
        })?;
        debug!(document.id = document_id, removed, generation, "deleted document chunks");
        Ok(removed)
    }

    fn replace_document(&self, document_id: &str, entries: Vec<IndexEntry>) -> Result<()> {
        if let Some(foreign) = entries.iter().find(|e| e.chunk.document_id != document_id) {
            return Err(RagError::ConfigError(format!(
                "chunk '{}' belongs to document '{}', not '{document_id}'",
                foreign.chunk.id, foreign.chunk.document_id
            )));
        }
        let stored = self.stored(entries)?;
        let chunk_count = stored.len();

        let _writer = self.writer.lock();
        let (removed, generation) = self.commit(|current| {
            let before = current.len();
            current.retain(|_, e| e.chunk.document_id != document_id);
            let removed = before - current.len();
            let mut seen = BTreeSet::new();
            for entry in stored {
                if !seen.insert(entry.chunk.id.clone()) {
                    return Err(RagError::DuplicateChunk(entry.chunk.id.clone()));
                }
                current.insert(entry.chunk.id.clone(), entry);
            }
            Ok(removed)
        })?;
        info!(document.id = document_id, removed, chunk_count, generation, "replaced document");
        Ok(())
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<QueryResult>> {
        self.check_vector(query, "query")?;
        let generation = self.snapshot();
        if top_k == 0 || generation.entries.is_empty() {
            return Ok(Vec::new());
        }

        let query_norm = l2_norm(query);
        let mut scored: Vec<(f32, &StoredEntry)> = generation
            .entries
            .values()
            .map(|entry| (similarity(query, query_norm, &entry.embedding, entry.norm), &**entry))
            .collect();

        if scored.len() > top_k {
            scored.select_nth_unstable_by(top_k - 1, by_rank);
            scored.truncate(top_k);
        }
        scored.sort_unstable_by(by_rank);

        debug!(generation = generation.number, top_k, result_count = scored.len(), "searched index");
        Ok(scored
            .into_iter()
            .map(|(score, entry)| QueryResult { chunk: entry.chunk.clone(), score })
            .collect())
    }

    fn entries(&self) -> Vec<IndexEntry> {
        self.entries_with_generation().1
    }

    fn entries_with_generation(&self) -> (u64, Vec<IndexEntry>) {
        let generation = self.snapshot();
        let entries = generation
            .entries
            .values()
            .map(|e| IndexEntry::new(e.chunk.clone(), e.embedding.clone()))
            .collect();
        (generation.number, entries)
    }
}

/// Descending score, then ascending chunk id.
fn by_rank(a: &(f32, &StoredEntry), b: &(f32, &StoredEntry)) -> Ordering {
    b.0.total_cmp(&a.0).then_with(|| a.1.chunk.id.cmp(&b.1.chunk.id))
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity clamped to `[0, 1]`.
///
/// Returns 0.0 if either vector has zero magnitude or the result is not finite.
fn similarity(a: &[f32], norm_a: f32, b: &[f32], norm_b: f32) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let cosine = dot / (norm_a * norm_b);
    if cosine.is_finite() { cosine.clamp(0.0, 1.0) } else { 0.0 }
}
