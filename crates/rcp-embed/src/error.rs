//! Error types for the embedding service.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EmbedError>;

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("model loading failed: {0}")]
    ModelLoad(String),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("inference error: {0}")]
    Inference(String),

    #[error("device error: {0}")]
    Device(String),

    #[error("model download failed: {0}")]
    Download(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<candle_core::Error> for EmbedError {
    fn from(e: candle_core::Error) -> Self {
        EmbedError::Inference(e.to_string())
    }
}

impl From<tokenizers::Error> for EmbedError {
    fn from(e: tokenizers::Error) -> Self {
        EmbedError::Tokenizer(e.to_string())
    }
}

impl From<hf_hub::api::sync::ApiError> for EmbedError {
    fn from(e: hf_hub::api::sync::ApiError) -> Self {
        EmbedError::Download(e.to_string())
    }
}

impl From<EmbedError> for rcp_common::error::RcpError {
    fn from(e: EmbedError) -> Self {
        match e {
            EmbedError::Download(m) | EmbedError::Device(m) => {
                rcp_common::error::RcpError::ExternalUnavailable(m)
            }
            EmbedError::InvalidInput(m) => rcp_common::error::RcpError::ParseError(m),
            other => rcp_common::error::RcpError::Internal(other.to_string()),
        }
    }
}
