//! C9: indexing pipeline transforming listed source documents into
//! populated BM25 + vector-index state for a named collection.

pub mod local;
pub mod pipeline;
pub mod report;
pub mod traits;

pub use local::{LocalObjectStore, PlainTextExtractor};
pub use pipeline::{IndexingPipeline, PipelineConfig};
pub use report::{PerFileReport, Report};
pub use traits::{ObjectStore, PdfExtractor};
