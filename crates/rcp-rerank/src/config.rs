//! Configuration for the cross-encoder reranker service.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    /// Hugging Face model id (`RERANKER_MODEL`).
    pub model_id: String,
    pub max_length: usize,
    pub batch_size: usize,
    pub use_gpu: bool,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            model_id: "cross-encoder/ms-marco-MiniLM-L-6-v2".to_string(),
            max_length: 512,
            batch_size: 16,
            use_gpu: true,
        }
    }
}

impl RerankerConfig {
    pub fn cpu() -> Self {
        Self { use_gpu: false, ..Default::default() }
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }
}
