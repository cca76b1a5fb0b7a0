//! Process-wide cache of loaded embedding models, keyed by model id.
//!
//! Loading a bi-encoder means downloading weights from the Hub and running
//! them through Candle's safetensors loader, both expensive enough that every
//! collection sharing a model id should reuse one instance rather than each
//! caller constructing its own.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::EmbeddingConfig;
use crate::embedder::BiEncoder;
use crate::error::Result;

/// Typed handle to the process-wide model cache.
///
/// Cloning is cheap; all clones share the same underlying table.
#[derive(Clone)]
pub struct ModelCache {
    inner: Arc<Mutex<HashMap<String, Arc<BiEncoder>>>>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Return the cached encoder for `config.model_id`, loading it on first use.
    pub async fn get_or_load(&self, config: EmbeddingConfig) -> Result<Arc<BiEncoder>> {
        let mut table = self.inner.lock().await;
        if let Some(existing) = table.get(&config.model_id) {
            return Ok(existing.clone());
        }
        let encoder = Arc::new(BiEncoder::new(config.clone()).await?);
        table.insert(config.model_id.clone(), encoder.clone());
        Ok(encoder)
    }

    /// Evict a model id, forcing the next `get_or_load` to reload it.
    pub async fn evict(&self, model_id: &str) {
        self.inner.lock().await.remove(model_id);
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::new()
    }
}
