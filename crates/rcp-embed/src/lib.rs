//! C6: bi-encoder embedding service backed by Candle.

pub mod batch;
pub mod cache;
pub mod config;
pub mod embedder;
pub mod error;
pub mod pooling;

pub use cache::ModelCache;
pub use config::EmbeddingConfig;
pub use embedder::BiEncoder;
pub use error::{EmbedError, Result};
pub use pooling::PoolingStrategy;
