//! Bi-encoder embedder using Candle.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, HiddenAct, PositionEmbeddingType};
use hf_hub::api::sync::Api;
use lru::LruCache;
use tokenizers::models::wordpiece::WordPieceBuilder;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::config::EmbeddingConfig;
use crate::error::{EmbedError, Result};
use crate::pooling::l2_normalize;

/// Bi-encoder embedder (C6): turns chunk text into dense vectors.
///
/// Loads a BERT-family model from the Hugging Face Hub and provides
/// batched, optionally cached, inference.
pub struct BiEncoder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    config: EmbeddingConfig,
    dim: usize,
    cache: Option<Arc<std::sync::Mutex<LruCache<String, Vec<f32>>>>>,
}

impl BiEncoder {
    pub async fn new(config: EmbeddingConfig) -> Result<Self> {
        let start = Instant::now();
        info!("loading embedding model: {}", config.model_id);

        let device = Self::select_device(&config)?;
        debug!("embedding device: {:?}", device);

        let model_id = config.model_id.clone();
        let (bert_config, tokenizer, weights_path) = tokio::task::spawn_blocking(move || {
            use hf_hub::{Repo, RepoType};

            let api = Api::new().map_err(|e| EmbedError::Download(format!("api init: {e}")))?;
            let api_repo = api.repo(Repo::new(model_id.clone(), RepoType::Model));

            let config_path = api_repo
                .get("config.json")
                .map_err(|e| EmbedError::Download(format!("config.json: {e}")))?;
            let bert_config = Self::load_config(&config_path)?;

            let tokenizer = if let Ok(tokenizer_path) = api_repo.get("tokenizer.json") {
                Tokenizer::from_file(&tokenizer_path).map_err(|e| EmbedError::Tokenizer(e.to_string()))?
            } else {
                let vocab_path = api_repo
                    .get("vocab.txt")
                    .map_err(|e| EmbedError::Download(format!("vocab.txt: {e}")))?;
                let vocab_content = std::fs::read_to_string(&vocab_path)?;
                let vocab: std::collections::HashMap<String, u32> = vocab_content
                    .lines()
                    .enumerate()
                    .map(|(i, line)| (line.to_string(), i as u32))
                    .collect();
                let wordpiece = WordPieceBuilder::new()
                    .vocab(vocab)
                    .continuing_subword_prefix("##".to_string())
                    .max_input_chars_per_word(100)
                    .unk_token("[UNK]".to_string())
                    .build()
                    .map_err(|e| EmbedError::Tokenizer(format!("wordpiece build: {e}")))?;
                Tokenizer::new(wordpiece)
            };

            let weights_path = api_repo
                .get("model.safetensors")
                .or_else(|_| api_repo.get("pytorch_model.bin"))
                .map_err(|e| EmbedError::Download(format!("model weights: {e}")))?;

            Ok::<_, EmbedError>((bert_config, tokenizer, weights_path))
        })
        .await
        .map_err(|e| EmbedError::Download(e.to_string()))??;

        let vb = if weights_path.extension().map(|e| e == "safetensors").unwrap_or(false) {
            unsafe { VarBuilder::from_mmaped_safetensors(&[&weights_path], DType::F32, &device)? }
        } else {
            VarBuilder::from_pth(&weights_path, DType::F32, &device)?
        };

        let dim = bert_config.hidden_size;
        let model = BertModel::load(vb, &bert_config)?;
        info!("embedding model loaded in {:.2}s", start.elapsed().as_secs_f32());

        let cache = if config.cache_size > 0 {
            Some(Arc::new(std::sync::Mutex::new(LruCache::new(
                NonZeroUsize::new(config.cache_size).unwrap(),
            ))))
        } else {
            None
        };

        Ok(Self {
            model,
            tokenizer,
            device,
            config,
            dim,
            cache,
        })
    }

    fn select_device(config: &EmbeddingConfig) -> Result<Device> {
        if !config.use_gpu {
            return Ok(Device::Cpu);
        }

        #[cfg(feature = "cuda")]
        {
            if let Ok(device) = Device::new_cuda(0) {
                return Ok(device);
            }
        }

        #[cfg(feature = "metal")]
        {
            if let Ok(device) = Device::new_metal(0) {
                return Ok(device);
            }
        }

        Ok(Device::Cpu)
    }

    fn load_config(path: &std::path::PathBuf) -> Result<Config> {
        let content = std::fs::read_to_string(path)?;
        let json: serde_json::Value = serde_json::from_str(&content)?;

        let hidden_act = match json.get("hidden_act").and_then(|v| v.as_str()) {
            Some("relu") => HiddenAct::Relu,
            Some("gelu_new") | Some("gelu_approximate") => HiddenAct::GeluApproximate,
            _ => HiddenAct::Gelu,
        };

        Ok(Config {
            vocab_size: json.get("vocab_size").and_then(|v| v.as_u64()).unwrap_or(30522) as usize,
            hidden_size: json.get("hidden_size").and_then(|v| v.as_u64()).unwrap_or(384) as usize,
            num_hidden_layers: json.get("num_hidden_layers").and_then(|v| v.as_u64()).unwrap_or(12) as usize,
            num_attention_heads: json.get("num_attention_heads").and_then(|v| v.as_u64()).unwrap_or(12) as usize,
            intermediate_size: json.get("intermediate_size").and_then(|v| v.as_u64()).unwrap_or(3072) as usize,
            hidden_act,
            hidden_dropout_prob: json.get("hidden_dropout_prob").and_then(|v| v.as_f64()).unwrap_or(0.1),
            max_position_embeddings: json
                .get("max_position_embeddings")
                .and_then(|v| v.as_u64())
                .unwrap_or(512) as usize,
            type_vocab_size: json.get("type_vocab_size").and_then(|v| v.as_u64()).unwrap_or(2) as usize,
            initializer_range: json.get("initializer_range").and_then(|v| v.as_f64()).unwrap_or(0.02),
            layer_norm_eps: json.get("layer_norm_eps").and_then(|v| v.as_f64()).unwrap_or(1e-12),
            pad_token_id: json.get("pad_token_id").and_then(|v| v.as_u64()).unwrap_or(0) as usize,
            position_embedding_type: PositionEmbeddingType::Absolute,
            use_cache: true,
            classifier_dropout: None,
            model_type: None,
        })
    }

    /// Encode a batch of texts into dense vectors (C6 contract).
    ///
    /// Order is preserved; deterministic for a given model id and input.
    pub async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        let mut uncached_indices = Vec::new();
        let mut uncached_texts = Vec::new();

        if let Some(cache) = &self.cache {
            let mut guard = cache.lock().unwrap();
            for (i, text) in texts.iter().enumerate() {
                if let Some(cached) = guard.get(text) {
                    out.push((i, cached.clone()));
                } else {
                    uncached_indices.push(i);
                    uncached_texts.push(text.clone());
                }
            }
        } else {
            uncached_indices = (0..texts.len()).collect();
            uncached_texts = texts.to_vec();
        }

        for batch_start in (0..uncached_texts.len()).step_by(self.config.batch_size.max(1)) {
            let batch_end = (batch_start + self.config.batch_size.max(1)).min(uncached_texts.len());
            let batch = &uncached_texts[batch_start..batch_end];
            let batch_embeddings = self.encode_batch(batch)?;

            if let Some(cache) = &self.cache {
                let mut guard = cache.lock().unwrap();
                for (text, embedding) in batch.iter().zip(batch_embeddings.iter()) {
                    guard.put(text.clone(), embedding.clone());
                }
            }

            for (j, embedding) in batch_embeddings.into_iter().enumerate() {
                out.push((uncached_indices[batch_start + j], embedding));
            }
        }

        out.sort_by_key(|(i, _)| *i);
        debug!(
            "encoded {} texts in {:.2}ms",
            texts.len(),
            start.elapsed().as_secs_f32() * 1000.0
        );
        Ok(out.into_iter().map(|(_, e)| e).collect())
    }

    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let text_refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
        let encodings = self
            .tokenizer
            .encode_batch(text_refs, true)
            .map_err(|e| EmbedError::Tokenizer(e.to_string()))?;

        let max_len_cfg = self.config.max_length.min(512);
        let mut input_ids_vec = Vec::with_capacity(texts.len());
        let mut attention_mask_vec = Vec::with_capacity(texts.len());
        let mut token_type_ids_vec = Vec::with_capacity(texts.len());

        for encoding in &encodings {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let type_ids = encoding.get_type_ids();
            let len = ids.len().min(max_len_cfg);
            input_ids_vec.push(ids[..len].to_vec());
            attention_mask_vec.push(mask[..len].to_vec());
            token_type_ids_vec.push(type_ids[..len].to_vec());
        }

        let max_len = input_ids_vec.iter().map(|v| v.len()).max().unwrap_or(0);
        for ((ids, mask), type_ids) in input_ids_vec
            .iter_mut()
            .zip(attention_mask_vec.iter_mut())
            .zip(token_type_ids_vec.iter_mut())
        {
            let pad_len = max_len - ids.len();
            ids.extend(std::iter::repeat_n(0, pad_len));
            mask.extend(std::iter::repeat_n(0, pad_len));
            type_ids.extend(std::iter::repeat_n(0, pad_len));
        }

        let batch_size = texts.len();
        let input_ids = Tensor::new(input_ids_vec, &self.device)?.reshape((batch_size, max_len))?;
        let attention_mask = Tensor::new(attention_mask_vec, &self.device)?
            .reshape((batch_size, max_len))?
            .to_dtype(DType::F32)?;
        let token_type_ids = Tensor::new(token_type_ids_vec, &self.device)?.reshape((batch_size, max_len))?;

        let embeddings = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = self.config.pooling.apply(&embeddings, &attention_mask)?;
        let normalized = if self.config.normalize { l2_normalize(&pooled)? } else { pooled };
        Ok(normalized.to_vec2::<f32>()?)
    }

    pub async fn encode_one(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.encode(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::InvalidInput("no embedding produced".to_string()))
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    pub fn model_id(&self) -> &str {
        &self.config.model_id
    }

    pub fn is_gpu(&self) -> bool {
        matches!(self.device, Device::Cuda(_) | Device::Metal(_))
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.lock().unwrap().clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_input_yields_no_embeddings() {
        let config = EmbeddingConfig::cpu();
        // Construction requires network access; only exercise the pure empty-input path.
        if let Ok(embedder) = BiEncoder::new(config).await {
            let out = embedder.encode(&[]).await.unwrap();
            assert!(out.is_empty());
        }
    }
}
