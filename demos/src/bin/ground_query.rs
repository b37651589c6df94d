//! # Grounding demo
//!
//! Ingests a few hematology reference pages, persists the index, reopens it
//! and grounds a handful of questions, printing the context block and the
//! citation list a generation step would receive.
//!
//! Uses a deterministic hash embedder so it runs with no model or API key.
//! Questions that repeat a passage verbatim are grounded; others fall below
//! the threshold and show the ungrounded path.
//!
//! Run: `cargo run -p docqa-demos --bin ground_query`

use std::sync::Arc;

use docqa_rag::{
    ChunkingConfig, Document, EmbeddingProvider, Grounding, RagConfig, RagPipeline,
    RetrievalOptions, TextUnit, UngroundedReason,
};
use futures::future::join_all;
use tracing::info;

const EMBEDDER_VERSION: &str = "demo-hash-v1";

/// Deterministic hash-based embeddings: identical text, identical vector.
struct HashEmbedder {
    dimensions: usize,
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> docqa_rag::Result<Vec<f32>> {
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
        EMBEDDER_VERSION
    }

    fn name(&self) -> &str {
        "demo-hash"
    }
}

fn reference_material() -> Vec<Document> {
    vec![
        Document::new("hemoglobin-patterns.pdf")
            .with_page(1, "Hb A is the predominant adult hemoglobin.")
            .with_page(2, "HbE disease is a mild hemoglobinopathy common in Southeast Asia.")
            .with_page(3, "Hb H disease results from deletion of three alpha globin genes."),
        Document::new("thalassemia-manual.pdf")
            .with_page(12, "Beta thalassemia major requires regular transfusion from early childhood.")
            .with_page(13, "Iron chelation prevents organ damage from transfusional overload."),
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    docqa_telemetry::init_telemetry("docqa-demo");

    let workdir = std::env::temp_dir().join("docqa-demo");
    let config = RagConfig::builder()
        .chunking(ChunkingConfig::builder().window(300).overlap(50).build()?)
        .retrieval(RetrievalOptions::new(3, 0.9))
        .context_budget(600, TextUnit::Chars)
        .index_path(workdir.join("vector_db").join("index.json"))
        .embedder_version(EMBEDDER_VERSION)
        .build()?;
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbedder { dimensions: 64 });

    // -- 1. Ingest and persist --------------------------------------------
    let pipeline = RagPipeline::builder()
        .config(config.clone())
        .embedding_provider(Arc::clone(&embedder))
        .build()?;
    let chunk_count = pipeline.rebuild(&reference_material()).await?;
    pipeline.persist().await?;
    info!(chunk_count, path = %config.index_path.display(), "index written");

    // -- 2. Reopen from disk, as a separate process would -----------------
    let pipeline = RagPipeline::open(config.clone(), embedder).await?;

    // -- 3. Ground questions concurrently ---------------------------------
    let questions = [
        "HbE disease is a mild hemoglobinopathy common in Southeast Asia.",
        "Iron chelation prevents organ damage from transfusional overload.",
        "What causes sickle cell crises?",
    ];
    let options = &config.retrieval;
    let outcomes = join_all(questions.iter().map(|q| pipeline.ground(q, options))).await;

    for (question, outcome) in questions.iter().zip(outcomes) {
        println!("\nQuestion: {question}");
        match outcome? {
            Grounding::Grounded(context) => {
                println!("{}", context.block);
                println!("Sources:");
                for (n, citation) in context.citations.iter().enumerate() {
                    println!("  [{}] {citation}", n + 1);
                }
            }
            Grounding::Ungrounded(reason) => {
                let why = match reason {
                    UngroundedReason::NoRelevantChunks => "nothing relevant".to_string(),
                    UngroundedReason::OverBudget => "context budget too small".to_string(),
                    UngroundedReason::Degraded(e) => format!("degraded: {e}"),
                };
                println!("  ({why}) {}", docqa_rag::NO_GROUNDING_NOTICE);
            }
        }
    }

    Ok(())
}
