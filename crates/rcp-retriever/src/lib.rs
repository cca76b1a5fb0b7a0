//! C8: hybrid retriever tying together the lexical and dense sub-retrievers.

pub mod retriever;
pub mod rrf;
pub mod types;

pub use retriever::{HybridRetriever, RetrieverConfig};
pub use rrf::{fuse, K_RRF};
pub use types::{RetrieveResponse, RetrievedChunk, Strategy};
