//! Retriever contract: ranking, threshold law, timeouts and failure kinds.

mod common;

use std::sync::Arc;
use std::time::Duration;

use docqa_rag::{
    EmbeddingProvider, IndexEntry, InMemoryVectorIndex, RagError, RetrievalOptions, Retriever,
    VectorStore,
};
use proptest::prelude::*;

use common::{
    DownEmbedder, LyingEmbedder, NanEmbedder, SlowEmbedder, StallingIndex, TOY_VERSION,
    TableEmbedder, basis, near_a3, toy_chunk, two_document_entries,
};

fn toy_retriever(embedder: impl EmbeddingProvider + 'static) -> Retriever {
    let index = InMemoryVectorIndex::new(8, TOY_VERSION);
    index.build(two_document_entries()).unwrap();
    Retriever::new(Arc::new(embedder), Arc::new(index)).unwrap()
}

#[tokio::test]
async fn query_near_chunk_three_ranks_it_first() {
    let retriever = toy_retriever(TableEmbedder::new(8).with("HbE disease", near_a3()));
    let context = retriever.retrieve("HbE disease", &RetrievalOptions::new(3, 0.0)).await.unwrap();

    let ids: Vec<&str> = context.iter().map(|r| r.chunk.id.as_str()).collect();
    assert_eq!(ids, vec!["A#p1:3", "A#p1:4", "A#p1:2"]);
    let scores: Vec<f32> = context.iter().map(|r| r.score).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn high_threshold_yields_empty_context() {
    let index = InMemoryVectorIndex::new(8, TOY_VERSION);
    index.build(vec![IndexEntry::new(toy_chunk("A", 0), basis(8, &[(0, 1.0)]))]).unwrap();
    let embedder = TableEmbedder::new(8).with("query", basis(8, &[(0, 0.6), (1, 0.8)]));
    let retriever = Retriever::new(Arc::new(embedder), Arc::new(index)).unwrap();

    let loose = retriever.retrieve("query", &RetrievalOptions::new(5, 0.0)).await.unwrap();
    assert!((loose.results()[0].score - 0.6).abs() < 1e-5);

    let strict = retriever.retrieve("query", &RetrievalOptions::new(5, 0.99)).await.unwrap();
    assert!(strict.is_empty());
}

#[tokio::test]
async fn empty_index_is_not_an_error() {
    let index = InMemoryVectorIndex::new(8, TOY_VERSION);
    let embedder = TableEmbedder::new(8).with("q", near_a3());
    let retriever = Retriever::new(Arc::new(embedder), Arc::new(index)).unwrap();
    let context = retriever.retrieve("q", &RetrievalOptions::new(5, 0.0)).await.unwrap();
    assert!(context.is_empty());
}

#[tokio::test]
async fn zero_top_k_is_a_config_error() {
    let retriever = toy_retriever(TableEmbedder::new(8).with("q", near_a3()));
    let err = retriever.retrieve("q", &RetrievalOptions::new(0, 0.0)).await.unwrap_err();
    assert!(matches!(err, RagError::ConfigError(_)));
    assert!(!err.is_recoverable());

    let nan = RetrievalOptions::new(3, f32::NAN);
    assert!(matches!(retriever.retrieve("q", &nan).await, Err(RagError::ConfigError(_))));
}

#[tokio::test]
async fn embedder_failure_is_recoverable() {
    let retriever = toy_retriever(DownEmbedder { dimensions: 8 });
    let err = retriever.retrieve("q", &RetrievalOptions::new(3, 0.0)).await.unwrap_err();
    assert!(matches!(err, RagError::EmbeddingError { .. }));
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn embedder_returning_wrong_dimension_is_an_embedding_error() {
    let retriever = toy_retriever(LyingEmbedder);
    let err = retriever.retrieve("q", &RetrievalOptions::new(3, 0.0)).await.unwrap_err();
    assert!(matches!(err, RagError::EmbeddingError { .. }), "got {err:?}");
}

#[tokio::test(start_paused = true)]
async fn slow_embedder_times_out() {
    let retriever =
        toy_retriever(SlowEmbedder { delay: Duration::from_secs(30), dimensions: 8 });
    let options = RetrievalOptions::new(3, 0.0).with_timeout(Duration::from_millis(200));

    let err = retriever.retrieve("q", &options).await.unwrap_err();
    match err {
        RagError::RetrievalTimeout { stage, timeout } => {
            assert_eq!(stage, "embed");
            assert_eq!(timeout, Duration::from_millis(200));
        }
        other => panic!("expected RetrievalTimeout, got {other:?}"),
    }
}

#[tokio::test]
async fn embedder_returning_nan_is_an_embedding_error() {
    let retriever = toy_retriever(NanEmbedder);
    let err = retriever.retrieve("q", &RetrievalOptions::new(3, 0.0)).await.unwrap_err();
    assert!(matches!(err, RagError::EmbeddingError { .. }), "got {err:?}");
    assert!(err.is_recoverable());
}

// The search runs on the blocking pool, which paused time does not drive.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_search_times_out() {
    let inner = InMemoryVectorIndex::new(8, TOY_VERSION);
    inner.build(two_document_entries()).unwrap();
    let index = StallingIndex { inner, stall: Duration::from_millis(500) };
    let embedder = TableEmbedder::new(8).with("q", near_a3());
    let retriever = Retriever::new(Arc::new(embedder), Arc::new(index)).unwrap();

    let options = RetrievalOptions::new(3, 0.0).with_timeout(Duration::from_millis(50));
    let err = retriever.retrieve("q", &options).await.unwrap_err();
    match err {
        RagError::RetrievalTimeout { stage, timeout } => {
            assert_eq!(stage, "search");
            assert_eq!(timeout, Duration::from_millis(50));
        }
        other => panic!("expected RetrievalTimeout, got {other:?}"),
    }
}

#[test]
fn sub_millisecond_timeout_rounds_up() {
    let options = RetrievalOptions::new(3, 0.0).with_timeout(Duration::from_micros(10));
    assert_eq!(options.timeout(), Some(Duration::from_millis(1)));
    let zero = RetrievalOptions::new(3, 0.0).with_timeout(Duration::ZERO);
    assert_eq!(zero.timeout(), Some(Duration::from_millis(1)));
    let fractional = RetrievalOptions::new(3, 0.0).with_timeout(Duration::from_micros(1500));
    assert_eq!(fractional.timeout(), Some(Duration::from_millis(2)));
    assert!(options.validate().is_ok());
}

#[test]
fn zero_timeout_is_a_config_error() {
    let options = RetrievalOptions { timeout_ms: Some(0), ..RetrievalOptions::new(3, 0.0) };
    assert!(matches!(options.validate(), Err(RagError::ConfigError(_))));
}

#[tokio::test]
async fn timeout_that_is_not_hit_changes_nothing() {
    let retriever = toy_retriever(TableEmbedder::new(8).with("q", near_a3()));
    let unbounded = retriever.retrieve("q", &RetrievalOptions::new(3, 0.0)).await.unwrap();
    let bounded = retriever
        .retrieve("q", &RetrievalOptions::new(3, 0.0).with_timeout(Duration::from_secs(10)))
        .await
        .unwrap();
    assert_eq!(unbounded, bounded);
}

#[test]
fn mismatched_embedder_version_is_rejected() {
    let index = InMemoryVectorIndex::new(8, "other-model");
    let err = Retriever::new(Arc::new(TableEmbedder::new(8)), Arc::new(index)).unwrap_err();
    assert!(matches!(err, RagError::IndexVersionMismatch { .. }));
}

#[test]
fn mismatched_embedder_dimension_is_rejected() {
    let index = InMemoryVectorIndex::new(16, TOY_VERSION);
    let err = Retriever::new(Arc::new(TableEmbedder::new(8)), Arc::new(index)).unwrap_err();
    assert!(matches!(err, RagError::DimensionMismatch { expected: 16, actual: 8 }));
}

fn arb_vector(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// `retrieve(q, k, t)` is exactly the members of `retrieve(q, k, 0)`
    /// scoring at least `t`, in the same order.
    #[test]
    fn threshold_selects_a_prefix_of_the_unthresholded_results(
        vectors in proptest::collection::vec(arb_vector(8), 1..25),
        query in arb_vector(8),
        top_k in 1usize..30,
        threshold in 0.0f32..1.0,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (all, filtered) = rt.block_on(async {
            let index = InMemoryVectorIndex::new(8, TOY_VERSION);
            let entries = vectors
                .into_iter()
                .enumerate()
                .map(|(i, v)| IndexEntry::new(toy_chunk("doc", i), v))
                .collect();
            index.build(entries).unwrap();
            let embedder = TableEmbedder::new(8).with("q", query);
            let retriever = Retriever::new(Arc::new(embedder), Arc::new(index)).unwrap();

            let all = retriever.retrieve("q", &RetrievalOptions::new(top_k, 0.0)).await.unwrap();
            let filtered =
                retriever.retrieve("q", &RetrievalOptions::new(top_k, threshold)).await.unwrap();
            (all, filtered)
        });

        let expected: Vec<_> = all.iter().filter(|r| r.score >= threshold).cloned().collect();
        prop_assert_eq!(filtered.results(), &expected[..]);
        prop_assert_eq!(&all.results()[..filtered.len()], filtered.results());
    }
}
