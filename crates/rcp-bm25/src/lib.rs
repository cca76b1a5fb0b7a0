//! C4: persistent Okapi BM25 sparse index.

pub mod codec;
pub mod model;
pub mod store;

pub use model::BM25Index;
pub use store::BM25Store;
