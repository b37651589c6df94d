//! Readers racing writers: every read sees exactly one complete generation.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use docqa_rag::{IndexEntry, InMemoryVectorIndex, VectorStore};

use common::{basis, toy_chunk};

const DIM: usize = 4;
const DOCS_PER_GENERATION: usize = 20;

fn generation(prefix: &str) -> Vec<IndexEntry> {
    (0..DOCS_PER_GENERATION)
        .map(|i| IndexEntry::new(toy_chunk(&format!("{prefix}-{i}"), 0), basis(DIM, &[(i % DIM, 1.0)])))
        .collect()
}

#[test]
fn rebuild_is_atomic_for_concurrent_readers() {
    let index = Arc::new(InMemoryVectorIndex::new(DIM, "v"));
    index.build(generation("old")).unwrap();
    let done = AtomicBool::new(false);

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let query = vec![1.0; DIM];
                while !done.load(Ordering::Acquire) {
                    let results = index.search(&query, 100).unwrap();
                    assert_eq!(results.len(), DOCS_PER_GENERATION, "partial generation observed");
                    let old = results.iter().filter(|r| r.chunk.document_id.starts_with("old-")).count();
                    assert!(old == 0 || old == DOCS_PER_GENERATION, "mixed generations: {old} old");

                    let ids = index.document_ids();
                    assert_eq!(ids.len(), DOCS_PER_GENERATION);
                }
            });
        }

        for round in 0..50 {
            let prefix = if round % 2 == 0 { "new" } else { "old" };
            index.build(generation(prefix)).unwrap();
        }
        done.store(true, Ordering::Release);
    });

    assert_eq!(index.count(), DOCS_PER_GENERATION);
}

#[test]
fn concurrent_upserts_are_all_applied() {
    let index = Arc::new(InMemoryVectorIndex::new(DIM, "v"));
    let start = index.generation();

    std::thread::scope(|scope| {
        for writer in 0..4 {
            let index = Arc::clone(&index);
            scope.spawn(move || {
                for seq in 0..25 {
                    index
                        .upsert(toy_chunk(&format!("w{writer}"), seq), basis(DIM, &[(seq % DIM, 1.0)]))
                        .unwrap();
                }
            });
        }
    });

    assert_eq!(index.count(), 100);
    assert_eq!(index.generation(), start + 100);
}

#[test]
fn reingest_during_reads_never_hides_other_documents() {
    let index = Arc::new(InMemoryVectorIndex::new(DIM, "v"));
    let mut entries = generation("stable");
    entries.push(IndexEntry::new(toy_chunk("moving", 0), basis(DIM, &[(0, 1.0)])));
    index.build(entries).unwrap();
    let done = AtomicBool::new(false);

    std::thread::scope(|scope| {
        scope.spawn(|| {
            while !done.load(Ordering::Acquire) {
                let stable = index
                    .entries()
                    .into_iter()
                    .filter(|e| e.chunk.document_id.starts_with("stable-"))
                    .count();
                assert_eq!(stable, DOCS_PER_GENERATION);
                let moving = index.document_ids().contains("moving");
                assert!(moving, "re-ingested document vanished mid-replace");
            }
        });

        for round in 0..100 {
            let fresh = (0..1 + round % 3)
                .map(|seq| IndexEntry::new(toy_chunk("moving", seq), basis(DIM, &[(seq % DIM, 1.0)])))
                .collect();
            index.replace_document("moving", fresh).unwrap();
        }
        done.store(true, Ordering::Release);
    });
}

#[test]
fn generation_and_entries_agree_under_concurrent_upserts() {
    let index = Arc::new(InMemoryVectorIndex::new(DIM, "v"));
    let done = AtomicBool::new(false);

    std::thread::scope(|scope| {
        scope.spawn(|| {
            while !done.load(Ordering::Acquire) {
                // Each upsert of a fresh chunk adds one entry and one generation.
                let (generation, entries) = index.entries_with_generation();
                assert_eq!(entries.len() as u64, generation);
            }
        });

        for seq in 0..200 {
            index.upsert(toy_chunk("doc", seq), basis(DIM, &[(seq % DIM, 1.0)])).unwrap();
        }
        done.store(true, Ordering::Release);
    });
}
