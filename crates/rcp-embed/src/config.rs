//! Configuration for the bi-encoder embedding service.

use crate::pooling::PoolingStrategy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Hugging Face model id bound to a collection (`EMBEDDING_MODEL`).
    pub model_id: String,
    pub max_length: usize,
    pub batch_size: usize,
    pub normalize: bool,
    pub pooling: PoolingStrategy,
    pub use_gpu: bool,
    /// Process-wide cache capacity for repeated encode() calls on identical text.
    pub cache_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_id: "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2".to_string(),
            max_length: 512,
            batch_size: 32,
            normalize: true,
            pooling: PoolingStrategy::Mean,
            use_gpu: true,
            cache_size: 10_000,
        }
    }
}

impl EmbeddingConfig {
    pub fn cpu() -> Self {
        Self {
            use_gpu: false,
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_max_length(mut self, length: usize) -> Self {
        self.max_length = length;
        self
    }
}
