//! rcp — command-line wrapper over the retrieval core.
//!
//! Thin: it owns no business logic, only argument parsing, store wiring,
//! and translating `RcpError` into the exit codes published in §6.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rcp_bm25::BM25Store;
use rcp_common::error::RcpError;
use rcp_config::RetrievalConfig;
use rcp_embed::{EmbeddingConfig, ModelCache};
use rcp_ingest::{IndexingPipeline, LocalObjectStore, PipelineConfig, PlainTextExtractor};
use rcp_jobs::{JobKey, JobManager};
use rcp_rerank::{RerankerCache, RerankerConfig};
use rcp_retriever::{HybridRetriever, RetrieverConfig, Strategy};
use rcp_vector::VectorStore;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rcp", version, about = "Hybrid dense/sparse retrieval core for RCP leaflets")]
struct Cli {
    /// Directory holding the BM25 file and the embedded vector store.
    #[arg(long, env = "RCP_DATA_DIR", default_value = "./data", global = true)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index every document an object store lists into a collection.
    Index {
        collection: String,
        /// Local directory standing in for the object-store collaborator (§6).
        #[arg(long)]
        source_dir: PathBuf,
        #[arg(long)]
        max_concurrent: Option<usize>,
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Run one retrieval query against an already-indexed collection.
    Query {
        collection: String,
        query: String,
        #[arg(long, value_enum, default_value = "hybrid")]
        strategy: StrategyArg,
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long)]
        no_rerank: bool,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum StrategyArg {
    Dense,
    Sparse,
    Hybrid,
}

impl From<StrategyArg> for Strategy {
    fn from(s: StrategyArg) -> Self {
        match s {
            StrategyArg::Dense => Strategy::Dense,
            StrategyArg::Sparse => Strategy::Sparse,
            StrategyArg::Hybrid => Strategy::Hybrid,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rcp=info,warn")))
        .init();

    let cli = Cli::parse();
    let config = RetrievalConfig::load().unwrap_or_else(|e| {
        tracing::warn!("falling back to default configuration: {e}");
        RetrievalConfig::default()
    });

    let result = match cli.command {
        Commands::Index { collection, source_dir, max_concurrent, batch_size } => {
            run_index(&cli.data_dir, &config, &collection, &source_dir, max_concurrent, batch_size).await
        }
        Commands::Query { collection, query, strategy, top_k, no_rerank } => {
            run_query(&cli.data_dir, &config, &collection, &query, strategy.into(), top_k, !no_rerank).await
        }
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            tracing::error!("{e}");
            std::process::exit(e.exit_code());
        }
    }
}

async fn run_index(
    data_dir: &std::path::Path,
    config: &RetrievalConfig,
    collection: &str,
    source_dir: &std::path::Path,
    max_concurrent: Option<usize>,
    batch_size: Option<usize>,
) -> Result<(), RcpError> {
    let bm25 = Arc::new(BM25Store::new(data_dir, collection, config.bm25_k1, config.bm25_b));
    bm25.load_if_present()?;

    let vector_store = VectorStore::open(data_dir.join("vectors")).await?;
    let embed_config = EmbeddingConfig::cpu().with_model(&config.embedding_model);
    let cache = ModelCache::new();
    let embedder = cache.get_or_load(embed_config).await.map_err(RcpError::from)?;
    let vectors = Arc::new(
        vector_store
            .collection(collection, embedder.dimension(), embedder.model_id(), "")
            .await?,
    );

    let mut pipeline_config = PipelineConfig {
        use_section_chunking: config.chunk_by_section,
        ..PipelineConfig::default()
    };
    pipeline_config.chunker.chunk_size = config.chunk_size;
    pipeline_config.chunker.overlap = config.chunk_overlap;
    pipeline_config.chunker.chunk_by_section = config.chunk_by_section;
    if let Some(n) = max_concurrent {
        pipeline_config.max_concurrent = n;
    }
    if let Some(n) = batch_size {
        pipeline_config.batch_size = n;
    }

    let pipeline = IndexingPipeline::new(
        Arc::new(LocalObjectStore::new(source_dir)),
        Arc::new(PlainTextExtractor),
        bm25,
        vectors,
        embedder,
        pipeline_config,
    );

    let jobs = JobManager::new();
    let job_id = jobs.start(JobKey { op: "index".to_string(), collection: collection.to_string() });
    let handle = jobs.handle(job_id);

    let report = pipeline.process_bucket(&handle).await?;
    println!("{}", serde_json::to_string_pretty(&report).expect("report serializes"));
    Ok(())
}

async fn run_query(
    data_dir: &std::path::Path,
    config: &RetrievalConfig,
    collection: &str,
    query: &str,
    strategy: Strategy,
    top_k: Option<usize>,
    rerank: bool,
) -> Result<(), RcpError> {
    let bm25 = Arc::new(BM25Store::new(data_dir, collection, config.bm25_k1, config.bm25_b));
    bm25.load_if_present()?;

    let vector_store = VectorStore::open(data_dir.join("vectors")).await?;
    let embed_config = EmbeddingConfig::cpu().with_model(&config.embedding_model);
    let embed_cache = ModelCache::new();
    let embedder = embed_cache.get_or_load(embed_config).await.map_err(RcpError::from)?;
    let reranker = if rerank {
        let rerank_cache = RerankerCache::new();
        let rerank_config = RerankerConfig::cpu().with_model(&config.reranker_model);
        Some(rerank_cache.get_or_load(rerank_config).await.map_err(RcpError::from)?)
    } else {
        None
    };
    let reranker_model_id = reranker.as_ref().map(|r: &Arc<rcp_rerank::CrossEncoder>| r.model_id()).unwrap_or("");
    let vectors = Arc::new(
        vector_store
            .collection(collection, embedder.dimension(), embedder.model_id(), reranker_model_id)
            .await?,
    );

    let retriever_config = RetrieverConfig {
        retrieval_top_k: config.retrieval_top_k,
        reranker_top_k: top_k.unwrap_or(config.reranker_top_k),
        hybrid_alpha: config.hybrid_alpha,
        ..RetrieverConfig::default()
    };
    let retriever = HybridRetriever::new(bm25, vectors, embedder, reranker, retriever_config)?;

    let response = retriever.retrieve(query, strategy, &CancellationToken::new()).await?;
    println!("{}", serde_json::to_string_pretty(&response).expect("response serializes"));
    Ok(())
}
