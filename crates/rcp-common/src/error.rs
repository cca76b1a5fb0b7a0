use thiserror::Error;

/// Shared error taxonomy for the retrieval core. Kind strings (the `as_kind`
/// output) are stable and meant to be mechanically translated by whatever
/// HTTP layer sits in front of this crate.
#[derive(Debug, Error)]
pub enum RcpError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("index corrupt: {0}")]
    IndexCorrupt(String),

    #[error("external collaborator unavailable: {0}")]
    ExternalUnavailable(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("operation cancelled: {0}")]
    Cancelled(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RcpError {
    /// Stable kind string for mechanical translation at the HTTP boundary.
    pub fn as_kind(&self) -> &'static str {
        match self {
            RcpError::ConfigError(_) => "ConfigError",
            RcpError::NotFound(_) => "NotFound",
            RcpError::IndexCorrupt(_) => "IndexCorrupt",
            RcpError::ExternalUnavailable(_) => "ExternalUnavailable",
            RcpError::Timeout(_) => "Timeout",
            RcpError::Cancelled(_) => "Cancelled",
            RcpError::ParseError(_) => "ParseError",
            RcpError::Internal(_) => "Internal",
        }
    }

    /// Exit code a CLI wrapper should use for this error (§6 of the core spec).
    pub fn exit_code(&self) -> i32 {
        match self {
            RcpError::ConfigError(_) => 2,
            RcpError::ExternalUnavailable(_) | RcpError::ParseError(_) | RcpError::NotFound(_) => {
                3
            }
            RcpError::Cancelled(_) => 4,
            RcpError::Timeout(_) | RcpError::IndexCorrupt(_) | RcpError::Internal(_) => 5,
        }
    }
}

pub type Result<T> = std::result::Result<T, RcpError>;
