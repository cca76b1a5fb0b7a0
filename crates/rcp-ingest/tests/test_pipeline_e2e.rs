//! Full pipeline test against a local source directory.
//!
//! Requires network access to download the embedding model from the
//! Hugging Face Hub on first run. Run with:
//! ```bash
//! cargo test --package rcp-ingest --test test_pipeline_e2e -- --ignored --nocapture
//! ```

use std::sync::Arc;

use rcp_bm25::BM25Store;
use rcp_embed::{BiEncoder, EmbeddingConfig};
use rcp_ingest::{IndexingPipeline, LocalObjectStore, PipelineConfig, PlainTextExtractor};
use rcp_jobs::{JobKey, JobManager};
use rcp_vector::VectorStore;

#[tokio::test]
#[ignore]
async fn indexes_a_small_local_corpus() {
    let source_dir = tempfile::tempdir().unwrap();
    std::fs::write(
        source_dir.path().join("leaflet-1.txt"),
        "4.1 INDICAȚII TERAPEUTICE\nDrug X is indicated for Y.\n4.2 DOZE ŞI MOD DE ADMINISTRARE\nThe daily dose is 15 mg/kg.\n",
    )
    .unwrap();

    let data_dir = tempfile::tempdir().unwrap();
    let bm25 = Arc::new(BM25Store::new(data_dir.path(), "demo", 1.5, 0.75));

    let vector_store = VectorStore::open(data_dir.path().join("vectors")).await.unwrap();
    let embedder = Arc::new(BiEncoder::new(EmbeddingConfig::cpu()).await.unwrap());
    let vectors = Arc::new(
        vector_store
            .collection("demo", embedder.dimension(), embedder.model_id(), "")
            .await
            .unwrap(),
    );

    let pipeline = IndexingPipeline::new(
        Arc::new(LocalObjectStore::new(source_dir.path())),
        Arc::new(PlainTextExtractor),
        bm25.clone(),
        vectors.clone(),
        embedder,
        PipelineConfig::default(),
    );

    let jobs = JobManager::new();
    let job_id = jobs.start(JobKey { op: "index".to_string(), collection: "demo".to_string() });
    let handle = jobs.handle(job_id);

    let report = pipeline.process_bucket(&handle).await.unwrap();
    assert_eq!(report.processed_ok, 1);
    assert!(report.chunks_indexed >= 2);
    assert_eq!(vectors.count().await.unwrap(), bm25.snapshot().n_docs() as usize);
}
