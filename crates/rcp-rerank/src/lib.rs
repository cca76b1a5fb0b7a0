//! C7: cross-encoder reranker service backed by Candle.

pub mod cache;
pub mod config;
pub mod error;
pub mod reranker;

pub use cache::RerankerCache;
pub use config::RerankerConfig;
pub use error::{RerankError, Result};
pub use reranker::{Candidate, CrossEncoder, RerankedCandidate};
