//! Shared test embedders and fixtures.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use docqa_rag::{
    Chunk, EmbeddingProvider, IndexEntry, InMemoryVectorIndex, QueryResult, RagError, Result,
    VectorStore, chunk_id,
};

pub const TOY_VERSION: &str = "toy-v1";

/// Deterministic hash-based embeddings: same text, same vector.
pub struct HashEmbedder {
    pub dimensions: usize,
    pub version: String,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, version: "hash-v1".to_string() }
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let hash = text.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        let mut emb = vec![0.0f32; self.dimensions];
        for (i, v) in emb.iter_mut().enumerate() {
            *v = ((hash.wrapping_add(i as u64)) as f32).sin();
        }
        let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            emb.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(emb)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_version(&self) -> &str {
        &self.version
    }

    fn name(&self) -> &str {
        "hash"
    }
}

/// Looks up hand-written vectors by exact text.
pub struct TableEmbedder {
    pub dimensions: usize,
    pub table: HashMap<String, Vec<f32>>,
}

impl TableEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, table: HashMap::new() }
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.table.insert(text.to_string(), vector);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for TableEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.table.get(text).cloned().ok_or_else(|| RagError::EmbeddingError {
            provider: "table".to_string(),
            message: format!("no vector for '{text}'"),
        })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_version(&self) -> &str {
        TOY_VERSION
    }

    fn name(&self) -> &str {
        "table"
    }
}

/// Sleeps before answering, to exercise timeouts.
pub struct SlowEmbedder {
    pub delay: Duration,
    pub dimensions: usize,
}

#[async_trait]
impl EmbeddingProvider for SlowEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        tokio::time::sleep(self.delay).await;
        Ok(vec![1.0; self.dimensions])
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_version(&self) -> &str {
        TOY_VERSION
    }
}

/// Always fails, like an embedding service that is down.
pub struct DownEmbedder {
    pub dimensions: usize,
}

#[async_trait]
impl EmbeddingProvider for DownEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::EmbeddingError {
            provider: "down".to_string(),
            message: "connection refused".to_string(),
        })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_version(&self) -> &str {
        TOY_VERSION
    }

    fn name(&self) -> &str {
        "down"
    }
}

/// Advertises one dimension but returns vectors of another.
pub struct LyingEmbedder;

#[async_trait]
impl EmbeddingProvider for LyingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0; 4])
    }

    fn dimensions(&self) -> usize {
        8
    }

    fn model_version(&self) -> &str {
        TOY_VERSION
    }
}

/// An index whose `search` blocks the calling thread before answering.
pub struct StallingIndex {
    pub inner: InMemoryVectorIndex,
    pub stall: Duration,
}

impl VectorStore for StallingIndex {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn embedder_version(&self) -> &str {
        self.inner.embedder_version()
    }

    fn generation(&self) -> u64 {
        self.inner.generation()
    }

    fn count(&self) -> usize {
        self.inner.count()
    }

    fn document_ids(&self) -> BTreeSet<String> {
        self.inner.document_ids()
    }

    fn build(&self, entries: Vec<IndexEntry>) -> Result<()> {
        self.inner.build(entries)
    }

    fn upsert(&self, chunk: Chunk, embedding: Vec<f32>) -> Result<()> {
        self.inner.upsert(chunk, embedding)
    }

    fn delete_by_document(&self, document_id: &str) -> Result<usize> {
        self.inner.delete_by_document(document_id)
    }

    fn replace_document(&self, document_id: &str, entries: Vec<IndexEntry>) -> Result<()> {
        self.inner.replace_document(document_id, entries)
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<QueryResult>> {
        std::thread::sleep(self.stall);
        self.inner.search(query, top_k)
    }

    fn entries(&self) -> Vec<IndexEntry> {
        self.inner.entries()
    }

    fn entries_with_generation(&self) -> (u64, Vec<IndexEntry>) {
        self.inner.entries_with_generation()
    }
}

/// Claims eight dimensions and returns a NaN component.
pub struct NanEmbedder;

#[async_trait]
impl EmbeddingProvider for NanEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0; 8];
        v[0] = f32::NAN;
        Ok(v)
    }

    fn dimensions(&self) -> usize {
        8
    }

    fn model_version(&self) -> &str {
        TOY_VERSION
    }
}

pub fn basis(dim: usize, weights: &[(usize, f32)]) -> Vec<f32> {
    let mut v = vec![0.0; dim];
    for &(i, w) in weights {
        v[i] = w;
    }
    v
}

pub fn toy_chunk(document_id: &str, seq: usize) -> Chunk {
    Chunk {
        id: chunk_id(document_id, 1, seq),
        document_id: document_id.to_string(),
        page: 1,
        char_range: seq * 10..seq * 10 + 10,
        text: format!("{document_id} passage {seq}"),
    }
}

/// Two documents of five chunks each in eight dimensions.
///
/// Against the query `e3 + 0.1 e4`, chunk A3 scores highest, then A4, then
/// A2; every other chunk is orthogonal to it.
pub fn two_document_entries() -> Vec<IndexEntry> {
    const DIM: usize = 8;
    let a = [
        basis(DIM, &[(0, 1.0)]),
        basis(DIM, &[(1, 1.0)]),
        basis(DIM, &[(2, 1.0), (3, 0.5)]),
        basis(DIM, &[(3, 1.0)]),
        basis(DIM, &[(3, 1.0), (4, 1.0)]),
    ];
    let b = [
        basis(DIM, &[(5, 1.0)]),
        basis(DIM, &[(6, 1.0)]),
        basis(DIM, &[(7, 1.0)]),
        basis(DIM, &[(5, 1.0), (6, 1.0)]),
        basis(DIM, &[(0, 1.0), (1, 1.0)]),
    ];
    let mut entries = Vec::new();
    for (seq, v) in a.into_iter().enumerate() {
        entries.push(IndexEntry::new(toy_chunk("A", seq), v));
    }
    for (seq, v) in b.into_iter().enumerate() {
        entries.push(IndexEntry::new(toy_chunk("B", seq), v));
    }
    entries
}

pub fn near_a3() -> Vec<f32> {
    basis(8, &[(3, 1.0), (4, 0.1)])
}
