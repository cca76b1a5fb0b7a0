//! Job record types (§3 Data Model, C10).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Terminal states are sticky: no further transition is legal.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedItem {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Progress {
    pub current: u64,
    pub total: u64,
    pub current_item: Option<String>,
    pub processed_ok: u64,
    pub processed_failed: u64,
    pub failed_items: Vec<FailedItem>,
}

/// Identifies a job's operation and target collection, used for the
/// at-most-one-concurrent-job-per-tuple dedup rule (§4.10).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKey {
    pub op: String,
    pub collection: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub key: JobKey,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub progress: Progress,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl JobRecord {
    pub fn new(job_id: Uuid, key: JobKey) -> Self {
        Self {
            job_id,
            key,
            status: JobStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            progress: Progress::default(),
            result: None,
            error: None,
        }
    }
}
