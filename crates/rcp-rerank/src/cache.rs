//! Process-wide cache of loaded reranker models, keyed by model id.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::RerankerConfig;
use crate::error::Result;
use crate::reranker::CrossEncoder;

/// Typed handle to the process-wide reranker cache. Cloning is cheap.
#[derive(Clone)]
pub struct RerankerCache {
    inner: Arc<Mutex<HashMap<String, Arc<CrossEncoder>>>>,
}

impl RerankerCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn get_or_load(&self, config: RerankerConfig) -> Result<Arc<CrossEncoder>> {
        let mut table = self.inner.lock().await;
        if let Some(existing) = table.get(&config.model_id) {
            return Ok(existing.clone());
        }
        let model = Arc::new(CrossEncoder::new(config.clone()).await?);
        table.insert(config.model_id.clone(), model.clone());
        Ok(model)
    }

    pub async fn evict(&self, model_id: &str) {
        self.inner.lock().await.remove(model_id);
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

impl Default for RerankerCache {
    fn default() -> Self {
        Self::new()
    }
}
