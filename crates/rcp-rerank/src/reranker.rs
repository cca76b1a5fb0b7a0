//! Cross-encoder reranker using Candle.

use candle_core::{DType, Device, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config, HiddenAct, PositionEmbeddingType};
use hf_hub::api::sync::Api;
use tokenizers::Tokenizer;
use tracing::info;

use crate::config::RerankerConfig;
use crate::error::{RerankError, Result};

/// A scored candidate returned from [`CrossEncoder::rerank`].
#[derive(Debug, Clone)]
pub struct RerankedCandidate {
    pub chunk_id: String,
    pub rerank_score: f32,
    pub text: String,
    pub metadata: serde_json::Value,
}

/// Input candidate for reranking (C7 contract).
#[derive(Debug, Clone)]
pub struct Candidate {
    pub chunk_id: String,
    pub text: String,
    pub metadata: serde_json::Value,
}

/// Cross-encoder scoring service (C7): jointly encodes (query, candidate)
/// pairs and emits a single relevance score per pair, sorted descending.
pub struct CrossEncoder {
    model: BertModel,
    classifier: Linear,
    tokenizer: Tokenizer,
    device: Device,
    config: RerankerConfig,
}

impl CrossEncoder {
    pub async fn new(config: RerankerConfig) -> Result<Self> {
        let start = std::time::Instant::now();
        info!("loading reranker model: {}", config.model_id);

        let device = Self::select_device(&config)?;

        let model_id = config.model_id.clone();
        let (bert_config, tokenizer, weights_path) = tokio::task::spawn_blocking(move || {
            use hf_hub::{Repo, RepoType};

            let api = Api::new().map_err(|e| RerankError::Download(format!("api init: {e}")))?;
            let api_repo = api.repo(Repo::new(model_id.clone(), RepoType::Model));

            let config_path = api_repo
                .get("config.json")
                .map_err(|e| RerankError::Download(format!("config.json: {e}")))?;
            let bert_config = Self::load_config(&config_path)?;

            let tokenizer_path = api_repo
                .get("tokenizer.json")
                .map_err(|e| RerankError::Download(format!("tokenizer.json: {e}")))?;
            let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| RerankError::Tokenizer(e.to_string()))?;

            let weights_path = api_repo
                .get("model.safetensors")
                .or_else(|_| api_repo.get("pytorch_model.bin"))
                .map_err(|e| RerankError::Download(format!("model weights: {e}")))?;

            Ok::<_, RerankError>((bert_config, tokenizer, weights_path))
        })
        .await
        .map_err(|e| RerankError::Download(e.to_string()))??;

        let vb = if weights_path.extension().map(|e| e == "safetensors").unwrap_or(false) {
            unsafe { VarBuilder::from_mmaped_safetensors(&[&weights_path], DType::F32, &device)? }
        } else {
            VarBuilder::from_pth(&weights_path, DType::F32, &device)?
        };

        let model = BertModel::load(vb.pp("bert"), &bert_config)?;
        let classifier = candle_nn::linear(bert_config.hidden_size, 1, vb.pp("classifier"))?;

        info!("reranker model loaded in {:.2}s", start.elapsed().as_secs_f32());

        Ok(Self {
            model,
            classifier,
            tokenizer,
            device,
            config,
        })
    }

    fn select_device(config: &RerankerConfig) -> Result<Device> {
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
            num_hidden_layers: json.get("num_hidden_layers").and_then(|v| v.as_u64()).unwrap_or(6) as usize,
            num_attention_heads: json.get("num_attention_heads").and_then(|v| v.as_u64()).unwrap_or(12) as usize,
            intermediate_size: json.get("intermediate_size").and_then(|v| v.as_u64()).unwrap_or(1536) as usize,
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

    /// Score and sort `candidates` against `query`, returning the top `top_k` (C7 contract).
    ///
    /// Candidates are processed in batches of `config.batch_size` to bound memory,
    /// then merged and sorted by descending score.
    pub fn rerank(&self, query: &str, candidates: &[Candidate], top_k: usize) -> Result<Vec<RerankedCandidate>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored = Vec::with_capacity(candidates.len());
        for batch in candidates.chunks(self.config.batch_size.max(1)) {
            let scores = self.score_batch(query, batch)?;
            for (candidate, score) in batch.iter().zip(scores) {
                scored.push(RerankedCandidate {
                    chunk_id: candidate.chunk_id.clone(),
                    rerank_score: score,
                    text: candidate.text.clone(),
                    metadata: candidate.metadata.clone(),
                });
            }
        }

        scored.sort_by(|a, b| b.rerank_score.partial_cmp(&a.rerank_score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    fn score_batch(&self, query: &str, batch: &[Candidate]) -> Result<Vec<f32>> {
        let pairs: Vec<(&str, &str)> = batch.iter().map(|c| (query, c.text.as_str())).collect();
        let encodings = self
            .tokenizer
            .encode_batch(pairs, true)
            .map_err(|e| RerankError::Tokenizer(e.to_string()))?;

        let max_len_cfg = self.config.max_length.min(512);
        let mut input_ids_vec = Vec::with_capacity(batch.len());
        let mut attention_mask_vec = Vec::with_capacity(batch.len());
        let mut token_type_ids_vec = Vec::with_capacity(batch.len());

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

        let n = batch.len();
        let input_ids = Tensor::new(input_ids_vec, &self.device)?.reshape((n, max_len))?;
        let attention_mask = Tensor::new(attention_mask_vec, &self.device)?
            .reshape((n, max_len))?
            .to_dtype(DType::F32)?;
        let token_type_ids = Tensor::new(token_type_ids_vec, &self.device)?.reshape((n, max_len))?;

        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let cls = hidden.narrow(1, 0, 1)?.squeeze(1)?;
        let logits = self.classifier.forward(&cls)?.squeeze(1)?;
        Ok(logits.to_vec1::<f32>()?)
    }

    pub fn model_id(&self) -> &str {
        &self.config.model_id
    }

    pub fn is_gpu(&self) -> bool {
        matches!(self.device, Device::Cuda(_) | Device::Metal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_candidates_yield_no_scores() {
        let config = RerankerConfig::cpu();
        if let Ok(model) = CrossEncoder::new(config).await {
            let out = model.rerank("query", &[], 5).unwrap();
            assert!(out.is_empty());
        }
    }
}
