//! Pooling strategies for turning token embeddings into one sentence vector.

use candle_core::Tensor;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum PoolingStrategy {
    #[default]
    Mean,
    Cls,
    Max,
}

impl PoolingStrategy {
    /// `embeddings`: (batch, seq_len, hidden_dim). `attention_mask`: (batch, seq_len).
    /// Returns (batch, hidden_dim).
    pub fn apply(&self, embeddings: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Tensor> {
        match self {
            PoolingStrategy::Mean => mean_pool(embeddings, attention_mask),
            PoolingStrategy::Cls => cls_pool(embeddings),
            PoolingStrategy::Max => max_pool(embeddings, attention_mask),
        }
    }
}

fn mean_pool(embeddings: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Tensor> {
    let mask_expanded = attention_mask.unsqueeze(2)?.expand(embeddings.shape())?;
    let sum_embeddings = (embeddings * &mask_expanded)?.sum(1)?;
    let sum_mask = attention_mask
        .unsqueeze(2)?
        .sum(1)?
        .clamp(1e-9f32, f32::MAX)?;
    sum_embeddings.broadcast_div(&sum_mask)
}

fn cls_pool(embeddings: &Tensor) -> candle_core::Result<Tensor> {
    embeddings.narrow(1, 0, 1)?.squeeze(1)
}

fn max_pool(embeddings: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Tensor> {
    let mask_expanded = attention_mask.unsqueeze(2)?.expand(embeddings.shape())?;
    let mask_offset = (&mask_expanded - 1.0)?;
    let large_neg = Tensor::new(-1e9f32, embeddings.device())?;
    let mask_values = mask_offset.broadcast_mul(&large_neg)?;
    let masked_embeddings = embeddings.broadcast_add(&mask_values)?;
    masked_embeddings.max(1)
}

/// L2-normalizes each row of a (batch, hidden_dim) tensor.
pub fn l2_normalize(embeddings: &Tensor) -> candle_core::Result<Tensor> {
    let norms = embeddings.sqr()?.sum_keepdim(1)?.sqrt()?;
    let norms_clamped = norms.clamp(1e-9f32, f32::MAX)?;
    embeddings.broadcast_div(&norms_clamped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn mean_pool_respects_attention_mask() {
        let device = Device::Cpu;
        let embeddings = Tensor::from_vec(
            vec![
                1.0f32, 2.0, 3.0, 4.0, 2.0, 3.0, 4.0, 5.0, 3.0, 4.0, 5.0, 6.0, 1.0, 1.0, 1.0, 1.0, 2.0,
                2.0, 2.0, 2.0, 0.0, 0.0, 0.0, 0.0,
            ],
            (2, 3, 4),
            &device,
        )
        .unwrap();
        let attention_mask =
            Tensor::from_vec(vec![1.0f32, 1.0, 1.0, 1.0, 1.0, 0.0], (2, 3), &device).unwrap();

        let pooled = mean_pool(&embeddings, &attention_mask).unwrap();
        let result = pooled.to_vec2::<f32>().unwrap();
        assert!((result[0][0] - 2.0).abs() < 1e-5);
        assert!((result[1][0] - 1.5).abs() < 1e-5);
    }

    #[test]
    fn l2_normalize_yields_unit_norm() {
        let device = Device::Cpu;
        let embeddings =
            Tensor::from_vec(vec![3.0f32, 4.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0], (2, 4), &device).unwrap();
        let normalized = l2_normalize(&embeddings).unwrap();
        let result = normalized.to_vec2::<f32>().unwrap();
        for row in result {
            let norm: f32 = row.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5);
        }
    }
}
