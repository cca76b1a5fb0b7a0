//! Public types for the hybrid retriever (C8).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Dense,
    Sparse,
    Hybrid,
}

/// A single retrieved passage with its fused/reranked relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub text: String,
    pub metadata: serde_json::Value,
    pub relevance_score: f32,
}

/// Envelope returned by `retrieve`, carrying the low-confidence signal
/// alongside the ranked results (§4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveResponse {
    pub results: Vec<RetrievedChunk>,
    pub low_confidence: bool,
}
