//! Result types returned by `process_bucket` / `process_single` (C9).

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct PerFileReport {
    pub source_id: String,
    pub chunks_indexed: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct Report {
    pub total_listed: usize,
    pub skipped_already_indexed: usize,
    pub processed_ok: usize,
    pub processed_failed: usize,
    pub chunks_indexed: usize,
    pub failed: Vec<(String, String)>,
}
