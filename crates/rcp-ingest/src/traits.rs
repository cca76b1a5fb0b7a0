//! External collaborator traits the indexing pipeline consumes (§6).

use async_trait::async_trait;
use rcp_common::error::RcpError;

/// Object store listing source documents for a collection.
///
/// `source_id` is treated as an opaque byte string unique within the corpus.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list(&self) -> Result<Vec<String>, RcpError>;
    async fn get(&self, source_id: &str) -> Result<Vec<u8>, RcpError>;
}

/// PDF (or other source format) to plain text extraction.
///
/// May internally use OCR; latency is unbounded from the pipeline's point of
/// view. All extraction failures surface as a single failure kind.
#[async_trait]
pub trait PdfExtractor: Send + Sync {
    async fn extract(&self, bytes: &[u8]) -> Result<String, RcpError>;
}
