//! On-disk representation of a vector index.
//!
//! An index file is a single JSON document holding the format version, the
//! embedding dimension, the embedder version tag and every
//! `(chunk, embedding)` entry. Files are written to a temporary sibling and
//! renamed into place, so a crash mid-write leaves the previous file intact.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{RagError, Result};
use crate::inmemory::InMemoryVectorIndex;
use crate::vectorstore::{IndexEntry, VectorStore};

/// Bumped whenever the layout of [`PersistedIndex`] changes.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedIndex {
    format_version: u32,
    dimension: usize,
    embedder_version: String,
    entries: Vec<IndexEntry>,
}

/// Serialize the current generation of `store` to `path`.
///
/// Only the snapshot is taken from the store; no lock is held while writing.
///
/// # Errors
///
/// Returns [`RagError::StorageError`] if the file cannot be written.
pub fn persist(store: &dyn VectorStore, path: &Path) -> Result<()> {
    let (generation, entries) = store.entries_with_generation();
    let persisted = PersistedIndex {
        format_version: FORMAT_VERSION,
        dimension: store.dimension(),
        embedder_version: store.embedder_version().to_string(),
        entries,
    };

    let storage_error = |message: String| {
        error!(path = %path.display(), %message, "failed to persist index");
        RagError::StorageError { path: path.to_path_buf(), message }
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .map_err(|e| storage_error(format!("cannot create {}: {e}", dir.display())))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| storage_error(format!("cannot create temporary file: {e}")))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer(&mut writer, &persisted)
            .map_err(|e| storage_error(format!("cannot serialize index: {e}")))?;
        writer.flush().map_err(|e| storage_error(format!("cannot write index: {e}")))?;
    }
    tmp.as_file().sync_all().map_err(|e| storage_error(format!("cannot sync index: {e}")))?;
    tmp.persist(path).map_err(|e| storage_error(format!("cannot move index into place: {e}")))?;

    info!(
        path = %path.display(),
        generation,
        chunk_count = persisted.entries.len(),
        "persisted index"
    );
    Ok(())
}

/// Load an index from `path` for use with the embedder tagged `embedder_version`.
///
/// # Errors
///
/// - [`RagError::IndexUnavailable`] if the file is missing, unreadable, not
///   a valid index, or internally inconsistent.
/// - [`RagError::IndexVersionMismatch`] if the index was built with another
///   embedding function.
pub fn load(path: &Path, embedder_version: &str) -> Result<InMemoryVectorIndex> {
    let unavailable = |reason: String| RagError::IndexUnavailable {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path).map_err(|e| unavailable(format!("cannot open index: {e}")))?;
    let persisted: PersistedIndex = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| unavailable(format!("corrupt index: {e}")))?;

    if persisted.format_version != FORMAT_VERSION {
        return Err(unavailable(format!(
            "unsupported format version {} (expected {FORMAT_VERSION})",
            persisted.format_version
        )));
    }
    if persisted.embedder_version != embedder_version {
        error!(
            path = %path.display(),
            expected = embedder_version,
            found = %persisted.embedder_version,
            "index was built with a different embedder"
        );
        return Err(RagError::IndexVersionMismatch {
            expected: embedder_version.to_string(),
            found: persisted.embedder_version,
        });
    }
    if persisted.dimension == 0 {
        return Err(unavailable("index dimension is zero".to_string()));
    }

    let chunk_count = persisted.entries.len();
    let index = InMemoryVectorIndex::from_entries(
        persisted.dimension,
        persisted.embedder_version,
        persisted.entries,
    )
    .map_err(|e| unavailable(format!("inconsistent index: {e}")))?;

    info!(path = %path.display(), chunk_count, dimension = index.dimension(), "loaded index");
    Ok(index)
}
