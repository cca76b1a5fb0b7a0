//! Configuration loading for the retrieval core (§6 configuration surface).
//!
//! Reads `rcp.toml` (path overridable via `RCP_CONFIG`) if present, then lets
//! individual `RCP_*`-prefixed environment variables override any field —
//! the env var table is the one published in the core spec's external
//! interfaces section.

use std::path::Path;

use rcp_common::error::RcpError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_reranker_model")]
    pub reranker_model: String,
    #[serde(default = "default_strategy")]
    pub retrieval_strategy: String,
    #[serde(default = "default_k1")]
    pub bm25_k1: f64,
    #[serde(default = "default_b")]
    pub bm25_b: f64,
    /// Reserved; active only under a future score-based fusion mode (§4.8).
    #[serde(default = "default_alpha")]
    pub hybrid_alpha: f32,
    #[serde(default = "default_retrieval_top_k")]
    pub retrieval_top_k: usize,
    #[serde(default = "default_reranker_top_k")]
    pub reranker_top_k: usize,
    #[serde(default = "default_true")]
    pub chunk_by_section: bool,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_embedding_model() -> String {
    "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2".to_string()
}
fn default_reranker_model() -> String {
    "cross-encoder/ms-marco-MiniLM-L-6-v2".to_string()
}
fn default_strategy() -> String {
    "hybrid".to_string()
}
fn default_k1() -> f64 {
    1.5
}
fn default_b() -> f64 {
    0.75
}
fn default_alpha() -> f32 {
    0.5
}
fn default_retrieval_top_k() -> usize {
    20
}
fn default_reranker_top_k() -> usize {
    5
}
fn default_true() -> bool {
    true
}
fn default_chunk_size() -> usize {
    512
}
fn default_chunk_overlap() -> usize {
    100
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            embedding_model: default_embedding_model(),
            reranker_model: default_reranker_model(),
            retrieval_strategy: default_strategy(),
            bm25_k1: default_k1(),
            bm25_b: default_b(),
            hybrid_alpha: default_alpha(),
            retrieval_top_k: default_retrieval_top_k(),
            reranker_top_k: default_reranker_top_k(),
            chunk_by_section: default_true(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl RetrievalConfig {
    /// Loads `rcp.toml` (or `RCP_CONFIG`'s path) if present, falling back to
    /// defaults, then applies any `RCP_*` environment overrides.
    pub fn load() -> Result<Self, RcpError> {
        let path = std::env::var("RCP_CONFIG").unwrap_or_else(|_| "rcp.toml".to_string());
        let mut config = if Path::new(&path).exists() {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| RcpError::ConfigError(format!("reading {path}: {e}")))?;
            toml::from_str(&content).map_err(|e| RcpError::ConfigError(format!("parsing {path}: {e}")))?
        } else {
            Self::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), RcpError> {
        if let Ok(v) = std::env::var("EMBEDDING_MODEL") {
            self.embedding_model = v;
        }
        if let Ok(v) = std::env::var("RERANKER_MODEL") {
            self.reranker_model = v;
        }
        if let Ok(v) = std::env::var("RETRIEVAL_STRATEGY") {
            self.retrieval_strategy = v;
        }
        if let Ok(v) = std::env::var("BM25_K1") {
            self.bm25_k1 = parse_env("BM25_K1", &v)?;
        }
        if let Ok(v) = std::env::var("BM25_B") {
            self.bm25_b = parse_env("BM25_B", &v)?;
        }
        if let Ok(v) = std::env::var("HYBRID_ALPHA") {
            self.hybrid_alpha = parse_env("HYBRID_ALPHA", &v)?;
        }
        if let Ok(v) = std::env::var("RETRIEVAL_TOP_K") {
            self.retrieval_top_k = parse_env("RETRIEVAL_TOP_K", &v)?;
        }
        if let Ok(v) = std::env::var("RERANKER_TOP_K") {
            self.reranker_top_k = parse_env("RERANKER_TOP_K", &v)?;
        }
        if let Ok(v) = std::env::var("CHUNK_BY_SECTION") {
            self.chunk_by_section = parse_env("CHUNK_BY_SECTION", &v)?;
        }
        if let Ok(v) = std::env::var("CHUNK_SIZE") {
            self.chunk_size = parse_env("CHUNK_SIZE", &v)?;
        }
        if let Ok(v) = std::env::var("CHUNK_OVERLAP") {
            self.chunk_overlap = parse_env("CHUNK_OVERLAP", &v)?;
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, RcpError> {
    raw.parse().map_err(|_| RcpError::ConfigError(format!("invalid value for {key}: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let config = RetrievalConfig::default();
        assert_eq!(config.retrieval_strategy, "hybrid");
        assert_eq!(config.retrieval_top_k, 20);
        assert_eq!(config.reranker_top_k, 5);
        assert!((config.bm25_k1 - 1.5).abs() < f64::EPSILON);
        assert!((config.bm25_b - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_env_reports_config_error_on_bad_value() {
        let err = parse_env::<usize>("RETRIEVAL_TOP_K", "not-a-number").unwrap_err();
        assert_eq!(err.as_kind(), "ConfigError");
    }
}
