//! Shared error taxonomy and small cross-crate helpers for the retrieval core.

pub mod chunk_id;
pub mod error;

pub use chunk_id::derive_chunk_id;
pub use error::{RcpError, Result};
