//! Error types for the reranker service.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RerankError>;

#[derive(Error, Debug)]
pub enum RerankError {
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

impl From<candle_core::Error> for RerankError {
    fn from(e: candle_core::Error) -> Self {
        RerankError::Inference(e.to_string())
    }
}

impl From<tokenizers::Error> for RerankError {
    fn from(e: tokenizers::Error) -> Self {
        RerankError::Tokenizer(e.to_string())
    }
}

impl From<hf_hub::api::sync::ApiError> for RerankError {
    fn from(e: hf_hub::api::sync::ApiError) -> Self {
        RerankError::Download(e.to_string())
    }
}

impl From<RerankError> for rcp_common::error::RcpError {
    fn from(e: RerankError) -> Self {
        match e {
            RerankError::Download(m) | RerankError::Device(m) => {
                rcp_common::error::RcpError::ExternalUnavailable(m)
            }
            RerankError::InvalidInput(m) => rcp_common::error::RcpError::ParseError(m),
            other => rcp_common::error::RcpError::Internal(other.to_string()),
        }
    }
}
