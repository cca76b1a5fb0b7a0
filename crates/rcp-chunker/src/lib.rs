//! Section-aware parsing, chunking, and lexical tokenization for RCP documents.

pub mod chunk;
pub mod section;
pub mod tokenizer;

pub use chunk::{chunk_document, Chunk, ChunkerConfig, ChunkingMethod};
pub use section::{parse_sections, ParsedDocument, Section};
pub use tokenizer::tokenize;
