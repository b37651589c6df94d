//! Context assembly: ranked results in, bounded citation-annotated block out.
//!
//! Each included chunk is rendered as `[n] text`, where `n` is the 1-based
//! position of its source in the citation list, and entries are separated by
//! a blank line. Chunks from the same (document, page) share one citation
//! whose relevance is the best of theirs. When the next chunk would push the
//! block over budget, it and every lower-ranked chunk are dropped whole.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TextUnit;
use crate::document::RetrievedContext;
use crate::error::{RagError, Result};

const ENTRY_SEPARATOR: &str = "\n\n";

/// A source reference for the assembled block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Citation {
    pub document_id: String,
    pub page: u32,
    /// Best similarity among the contributing chunks, as a percentage.
    pub relevance_percent: u8,
}

impl fmt::Display for Citation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, page {} (relevance {}%)", self.document_id, self.page, self.relevance_percent)
    }
}

/// The generation-step input: a text block and its parallel citation list.
///
/// Both are empty when nothing was retrieved, which callers treat as
/// "no grounding found".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AssembledContext {
    /// `[n] text` entries separated by blank lines.
    pub block: String,
    /// Citations in order of first reference; `[n]` refers to `citations[n - 1]`.
    pub citations: Vec<Citation>,
    /// Number of chunks rendered into the block.
    pub included: usize,
    /// Number of lower-ranked chunks left out to respect the budget.
    pub dropped: usize,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.block.is_empty()
    }
}

/// Converts a [`RetrievedContext`] into an [`AssembledContext`] within a budget.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{ContextAssembler, TextUnit};
///
/// let assembler = ContextAssembler::new(3000, TextUnit::Chars)?;
/// let assembled = assembler.assemble(&retrieved);
/// for citation in &assembled.citations {
///     println!("{citation}");
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextAssembler {
    budget: usize,
    unit: TextUnit,
}

impl ContextAssembler {
    /// Create an assembler whose blocks never exceed `budget` in `unit`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `budget == 0`.
    pub fn new(budget: usize, unit: TextUnit) -> Result<Self> {
        if budget == 0 {
            return Err(RagError::ConfigError(
                "context budget must be greater than zero".to_string(),
            ));
        }
        Ok(Self { budget, unit })
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn unit(&self) -> TextUnit {
        self.unit
    }

    /// Render `context` in ranking order, stopping before the first chunk
    /// that does not fit.
    pub fn assemble(&self, context: &RetrievedContext) -> AssembledContext {
        let mut block = String::new();
        let mut used = 0;
        let mut sources: Vec<(String, u32, f32)> = Vec::new();
        let mut positions: HashMap<(&str, u32), usize> = HashMap::new();
        let mut included = 0;

        for result in context {
            let chunk = &result.chunk;
            let key = (chunk.document_id.as_str(), chunk.page);
            let marker = positions.get(&key).map_or(sources.len() + 1, |pos| pos + 1);

            let separator = if block.is_empty() { "" } else { ENTRY_SEPARATOR };
            let entry = format!("{separator}[{marker}] {}", chunk.text.trim());
            let cost = self.unit.measure(&entry);
            if used + cost > self.budget {
                break;
            }

            block.push_str(&entry);
            used += cost;
            included += 1;
            match positions.get(&key) {
                Some(&pos) => sources[pos].2 = sources[pos].2.max(result.score),
                None => {
                    positions.insert(key, sources.len());
                    sources.push((chunk.document_id.clone(), chunk.page, result.score));
                }
            }
        }

        let dropped = context.len() - included;
        debug!(included, dropped, citations = sources.len(), size = used, "assembled context");

        AssembledContext {
            block,
            citations: sources
                .into_iter()
                .map(|(document_id, page, score)| Citation {
                    document_id,
                    page,
                    relevance_percent: to_percent(score),
                })
                .collect(),
            included,
            dropped,
        }
    }
}

fn to_percent(score: f32) -> u8 {
    (score.clamp(0.0, 1.0) * 100.0).round() as u8
}
