//! Hybrid retriever (C8): orchestrates C3/C4/C5/C6/C7 into `retrieve()`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rcp_bm25::BM25Store;
use rcp_chunker::tokenizer::tokenize;
use rcp_common::error::RcpError;
use rcp_embed::BiEncoder;
use rcp_rerank::{Candidate, CrossEncoder};
use rcp_vector::VectorCollection;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::rrf::fuse;
use crate::types::{RetrievedChunk, Strategy};
use crate::RetrieveResponse;

/// Tunables for one collection's retrieval behavior. `retrieval_top_k` bounds
/// each sub-retrieval in `hybrid` mode; `reranker_top_k` bounds the final
/// response size for every strategy; `hybrid_alpha` is accepted for wire
/// compatibility but ignored, since fusion here is RRF-based (§4.8).
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    pub retrieval_top_k: usize,
    pub reranker_top_k: usize,
    pub hybrid_alpha: f32,
    pub low_confidence_threshold: f32,
    /// Per-query wall-clock budget (§5); expiry returns `Timeout`, never
    /// partial results.
    pub query_timeout: Duration,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            retrieval_top_k: 20,
            reranker_top_k: 5,
            hybrid_alpha: 0.5,
            low_confidence_threshold: 0.25,
            query_timeout: Duration::from_secs(10),
        }
    }
}

pub struct HybridRetriever {
    bm25: Arc<BM25Store>,
    vectors: Arc<VectorCollection>,
    embedder: Arc<BiEncoder>,
    reranker: Option<Arc<CrossEncoder>>,
    config: RetrieverConfig,
}

impl HybridRetriever {
    /// Builds a retriever over an already-opened collection. Re-checks the
    /// collection's bound model ids against the live embedder/reranker as a
    /// defense-in-depth measure on top of the check `VectorStore::collection`
    /// already performed at open time (§3, §4.6): a caller that opened the
    /// collection once and later swaps in a different embedder without
    /// reopening it is still refused here.
    pub fn new(
        bm25: Arc<BM25Store>,
        vectors: Arc<VectorCollection>,
        embedder: Arc<BiEncoder>,
        reranker: Option<Arc<CrossEncoder>>,
        config: RetrieverConfig,
    ) -> Result<Self, RcpError> {
        let bound_embedding = vectors.embedding_model_id();
        if !bound_embedding.is_empty() && bound_embedding != embedder.model_id() {
            return Err(RcpError::ConfigError(format!(
                "collection {} is bound to embedding model '{bound_embedding}', refusing to query with '{}'",
                vectors.name(),
                embedder.model_id()
            )));
        }
        if let Some(reranker) = &reranker {
            let bound_reranker = vectors.reranker_model_id();
            if !bound_reranker.is_empty() && bound_reranker != reranker.model_id() {
                return Err(RcpError::ConfigError(format!(
                    "collection {} is bound to reranker model '{bound_reranker}', refusing to query with '{}'",
                    vectors.name(),
                    reranker.model_id()
                )));
            }
        }
        Ok(Self { bm25, vectors, embedder, reranker, config })
    }

    /// Runs one retrieval. `cancellation` is cooperative: if it fires before
    /// the query finishes, pending sub-retrievals are dropped in place and a
    /// `Cancelled` error is returned instead of partial results (§5). A
    /// caller with nothing to cancel against can pass `&CancellationToken::new()`.
    pub async fn retrieve(
        &self,
        query: &str,
        strategy: Strategy,
        cancellation: &CancellationToken,
    ) -> Result<RetrieveResponse, RcpError> {
        let work = async {
            match strategy {
                Strategy::Dense => self.retrieve_dense(query, self.config.reranker_top_k).await,
                Strategy::Sparse => self.retrieve_sparse(query, self.config.reranker_top_k).await,
                Strategy::Hybrid => self.retrieve_hybrid(query).await,
            }
        };

        tokio::select! {
            result = tokio::time::timeout(self.config.query_timeout, work) => {
                result.unwrap_or_else(|_| Err(RcpError::Timeout(format!("query exceeded {:?}", self.config.query_timeout))))
            }
            _ = cancellation.cancelled() => Err(RcpError::Cancelled("query cancelled".to_string())),
        }
    }

    async fn dense_candidates(&self, query: &str, top_k: usize) -> Result<Vec<rcp_vector::ScoredChunk>, RcpError> {
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let embedding = self
            .embedder
            .encode_one(query)
            .await
            .map_err(RcpError::from)?;
        self.vectors.query(&embedding, top_k).await
    }

    fn sparse_candidate_ids(&self, query: &str, top_k: usize) -> Vec<(String, f64)> {
        let q_tokens = tokenize(query);
        if q_tokens.is_empty() {
            return Vec::new();
        }
        self.bm25.snapshot().query(&q_tokens, top_k)
    }

    async fn retrieve_dense(&self, query: &str, top_k: usize) -> Result<RetrieveResponse, RcpError> {
        let candidates = self.dense_candidates(query, top_k).await?;
        let top1 = candidates.first().map(|c| c.score);
        self.finish(
            query,
            candidates
                .into_iter()
                .map(|c| Candidate { chunk_id: c.chunk_id, text: c.text, metadata: chunk_metadata(&c) })
                .collect(),
            top1,
        )
        .await
    }

    async fn retrieve_sparse(&self, query: &str, top_k: usize) -> Result<RetrieveResponse, RcpError> {
        let ranked = self.sparse_candidate_ids(query, top_k);
        if ranked.is_empty() {
            return Ok(RetrieveResponse { results: Vec::new(), low_confidence: true });
        }
        let ids: Vec<String> = ranked.iter().map(|(id, _)| id.clone()).collect();
        let rows = self.vectors.get_by_ids(&ids).await?;
        let by_id: HashMap<&str, &rcp_vector::ScoredChunk> =
            rows.iter().map(|r| (r.chunk_id.as_str(), r)).collect();

        let candidates: Vec<Candidate> = ids
            .iter()
            .filter_map(|id| by_id.get(id.as_str()).map(|r| Candidate {
                chunk_id: r.chunk_id.clone(),
                text: r.text.clone(),
                metadata: chunk_metadata(r),
            }))
            .collect();
        self.finish(query, candidates, None).await
    }

    async fn retrieve_hybrid(&self, query: &str) -> Result<RetrieveResponse, RcpError> {
        let top_k = self.config.retrieval_top_k;
        let (dense, sparse) = tokio::try_join!(self.dense_candidates(query, top_k), async {
            Ok::<_, RcpError>(self.sparse_candidate_ids(query, top_k))
        })?;

        if dense.is_empty() && sparse.is_empty() {
            return Ok(RetrieveResponse { results: Vec::new(), low_confidence: true });
        }

        let dense_ids: Vec<String> = dense.iter().map(|c| c.chunk_id.clone()).collect();
        let sparse_ids: Vec<String> = sparse.iter().map(|(id, _)| id.clone()).collect();
        let fused = fuse(&dense_ids, &sparse_ids);

        let mut by_id: HashMap<String, &rcp_vector::ScoredChunk> =
            dense.iter().map(|c| (c.chunk_id.clone(), c)).collect();
        let missing: Vec<String> = fused
            .iter()
            .map(|(id, _)| id.clone())
            .filter(|id| !by_id.contains_key(id))
            .collect();
        let extra = self.vectors.get_by_ids(&missing).await?;
        for row in &extra {
            by_id.insert(row.chunk_id.clone(), row);
        }

        let candidates: Vec<Candidate> = fused
            .iter()
            .filter_map(|(id, _)| by_id.get(id).map(|r| Candidate {
                chunk_id: r.chunk_id.clone(),
                text: r.text.clone(),
                metadata: chunk_metadata(r),
            }))
            .collect();

        self.finish(query, candidates, dense.first().map(|c| c.score)).await
    }

    async fn finish(
        &self,
        query: &str,
        candidates: Vec<Candidate>,
        dense_top1: Option<f32>,
    ) -> Result<RetrieveResponse, RcpError> {
        if candidates.is_empty() {
            return Ok(RetrieveResponse { results: Vec::new(), low_confidence: true });
        }

        let top_k = self.config.reranker_top_k.min(candidates.len());
        let (results, max_score) = if let Some(reranker) = &self.reranker {
            let reranked = reranker
                .rerank(query, &candidates, top_k)
                .map_err(RcpError::from)?;
            let max = reranked.iter().map(|r| r.rerank_score).fold(f32::MIN, f32::max);
            let out = reranked
                .into_iter()
                .map(|r| RetrievedChunk {
                    chunk_id: r.chunk_id,
                    text: r.text,
                    metadata: r.metadata,
                    relevance_score: r.rerank_score,
                })
                .collect();
            (out, Some(max))
        } else {
            let out: Vec<RetrievedChunk> = candidates
                .into_iter()
                .take(top_k)
                .enumerate()
                .map(|(i, c)| RetrievedChunk {
                    chunk_id: c.chunk_id,
                    text: c.text,
                    metadata: c.metadata,
                    relevance_score: dense_top1.unwrap_or(1.0 / (1.0 + i as f32)),
                })
                .collect();
            (out, dense_top1)
        };

        let low_confidence = max_score
            .map(|s| s < self.config.low_confidence_threshold)
            .unwrap_or(true);
        debug!(n = results.len(), low_confidence, "retrieve finished");
        Ok(RetrieveResponse { results, low_confidence })
    }
}

fn chunk_metadata(c: &rcp_vector::ScoredChunk) -> serde_json::Value {
    serde_json::json!({
        "source_id": c.source_id,
        "section_number": c.section_number,
        "section_title": c.section_title,
        "chunk_index": c.chunk_index,
    })
}
