//! Data types for documents, chunks, and search results.

use std::cmp::Ordering;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// One page of extracted source text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Page {
    /// Page number as reported by the extraction step.
    pub number: u32,
    /// The raw text of the page.
    pub text: String,
}

impl Page {
    /// Create a page from its number and text.
    pub fn new(number: u32, text: impl Into<String>) -> Self {
        Self { number, text: text.into() }
    }
}

/// A source document: an identifier and its pages in order.
///
/// Re-ingesting a document with the same `id` replaces every chunk the index
/// holds for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// Ordered `(page number, text)` pairs.
    pub pages: Vec<Page>,
}

impl Document {
    /// Create a document with no pages.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), pages: Vec::new() }
    }

    /// Append a page, returning the document for chaining.
    pub fn with_page(mut self, number: u32, text: impl Into<String>) -> Self {
        self.pages.push(Page::new(number, text));
        self
    }
}

/// A passage of a [`Document`], the atomic unit of retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// Stable identifier derived from document id, page and sequence index.
    pub id: String,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// The page this chunk was cut from.
    pub page: u32,
    /// Half-open character offsets within the page text.
    pub char_range: Range<usize>,
    /// The text content of the chunk.
    pub text: String,
}

/// Build the identifier of the `seq`-th chunk on `page` of `document_id`.
pub fn chunk_id(document_id: &str, page: u32, seq: usize) -> String {
    format!("{document_id}#p{page}:{seq}")
}

/// A retrieved [`Chunk`] paired with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Cosine similarity clamped to `[0, 1]` (higher is more relevant).
    pub score: f32,
}

impl QueryResult {
    /// Ranking order: descending score, then ascending chunk id.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other.score.total_cmp(&self.score).then_with(|| self.chunk.id.cmp(&other.chunk.id))
    }
}

/// Ranked results that cleared the similarity threshold.
///
/// An empty context is a valid outcome meaning "insufficient grounding".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RetrievedContext {
    results: Vec<QueryResult>,
}

impl RetrievedContext {
    /// Wrap results that are already ranked.
    pub fn new(results: Vec<QueryResult>) -> Self {
        Self { results }
    }

    /// The explicitly empty context.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// The results in ranking order.
    pub fn results(&self) -> &[QueryResult] {
        &self.results
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QueryResult> {
        self.results.iter()
    }

    pub fn into_results(self) -> Vec<QueryResult> {
        self.results
    }
}

impl<'a> IntoIterator for &'a RetrievedContext {
    type Item = &'a QueryResult;
    type IntoIter = std::slice::Iter<'a, QueryResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}
