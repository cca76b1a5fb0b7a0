//! C5: persistent dense vector index, wrapping an embedded LanceDB store.

pub mod collection;
pub mod schema;

pub use collection::{ScoredChunk, VectorCollection, VectorStore, DEFAULT_BATCH_SIZE};
pub use schema::VectorRecord;
