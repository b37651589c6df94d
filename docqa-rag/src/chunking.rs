//! Document chunking.
//!
//! [`WindowChunker`] cuts every page of a [`Document`] independently into
//! overlapping windows measured in characters or whitespace-delimited tokens.
//! Chunks never cross a page boundary and together they cover every
//! character of every non-blank page; [`verify_coverage`] checks the latter
//! for each page before chunks are handed out.

use std::ops::Range;

use tracing::debug;

use crate::config::{ChunkingConfig, TextUnit};
use crate::document::{Chunk, Document, Page, chunk_id};
use crate::error::{RagError, Result};

/// A strategy for splitting documents into chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks, page by page, in page order.
    ///
    /// Identical input must yield identical chunk identifiers and text.
    fn chunk(&self, document: &Document) -> Result<Vec<Chunk>>;
}

/// Splits pages into fixed-size windows with configurable overlap.
///
/// Chunk IDs are `{document_id}#p{page}:{seq}` where `seq` counts chunks
/// within the page. A page shorter than one window yields exactly one chunk;
/// blank pages yield none.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{ChunkingConfig, WindowChunker};
///
/// let chunker = WindowChunker::new(ChunkingConfig::builder().window(256).overlap(50).build()?)?;
/// let chunks = chunker.chunk(&document)?;
/// ```
#[derive(Debug, Clone)]
pub struct WindowChunker {
    config: ChunkingConfig,
}

impl WindowChunker {
    /// Create a chunker from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `overlap >= window` or `window == 0`.
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    fn page_ranges(&self, text: &str) -> Vec<Range<usize>> {
        match self.config.unit {
            TextUnit::Chars => char_windows(text.chars().count(), &self.config),
            TextUnit::Tokens => token_windows(text, &self.config),
        }
    }

    fn chunk_page(&self, document_id: &str, page: &Page) -> Result<Vec<Chunk>> {
        if page.text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let ranges = self.page_ranges(&page.text);
        let char_len = page.text.chars().count();
        verify_coverage(char_len, &ranges).map_err(|e| {
            RagError::ChunkingError(format!("{document_id} page {}: {e}", page.number))
        })?;

        let offsets = byte_offsets(&page.text);
        Ok(ranges
            .into_iter()
            .enumerate()
            .map(|(seq, range)| Chunk {
                id: chunk_id(document_id, page.number, seq),
                document_id: document_id.to_string(),
                page: page.number,
                text: page.text[offsets[range.start]..offsets[range.end]].to_string(),
                char_range: range,
            })
            .collect())
    }
}

impl Chunker for WindowChunker {
    fn chunk(&self, document: &Document) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::new();
        for page in &document.pages {
            chunks.extend(self.chunk_page(&document.id, page)?);
        }
        debug!(
            document.id = %document.id,
            pages = document.pages.len(),
            chunk_count = chunks.len(),
            "chunked document"
        );
        Ok(chunks)
    }
}

/// Byte offset of every char boundary, including the end of the string.
fn byte_offsets(text: &str) -> Vec<usize> {
    text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect()
}

/// Windows over `len` characters.
fn char_windows(len: usize, config: &ChunkingConfig) -> Vec<Range<usize>> {
    let step = config.window - config.overlap;
    let mut ranges = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + config.window).min(len);
        ranges.push(start..end);
        if end == len {
            break;
        }
        start += step;
    }
    ranges
}

/// Windows over whitespace-delimited tokens, expressed as char ranges.
///
/// The first window starts at the beginning of the page and each window
/// extends up to the next token it does not contain (or to the end of the
/// page), so whitespace between tokens is never left uncovered.
fn token_windows(text: &str, config: &ChunkingConfig) -> Vec<Range<usize>> {
    let mut token_starts = Vec::new();
    let mut in_token = false;
    let mut char_len = 0;
    for (pos, ch) in text.chars().enumerate() {
        let is_space = ch.is_whitespace();
        if !is_space && !in_token {
            token_starts.push(pos);
        }
        in_token = !is_space;
        char_len = pos + 1;
    }

    let token_count = token_starts.len();
    if token_count == 0 {
        return Vec::new();
    }

    let step = config.window - config.overlap;
    let mut ranges = Vec::new();
    let mut first = 0;
    loop {
        let last = (first + config.window).min(token_count);
        let start = if first == 0 { 0 } else { token_starts[first] };
        let end = if last == token_count { char_len } else { token_starts[last] };
        ranges.push(start..end);
        if last == token_count {
            break;
        }
        first += step;
    }
    ranges
}

/// Check that `ranges`, in order, cover `0..len` without gaps.
///
/// # Errors
///
/// Returns [`RagError::ChunkingError`] naming the first uncovered position.
pub fn verify_coverage(len: usize, ranges: &[Range<usize>]) -> Result<()> {
    let mut covered = 0;
    for range in ranges {
        if range.start > covered {
            return Err(RagError::ChunkingError(format!(
                "characters {covered}..{} are not covered by any chunk",
                range.start
            )));
        }
        covered = covered.max(range.end);
    }
    if covered < len {
        return Err(RagError::ChunkingError(format!(
            "characters {covered}..{len} are not covered by any chunk"
        )));
    }
    Ok(())
}
