//! C10: job manager owning long-running asynchronous indexing jobs.

pub mod manager;
pub mod types;

pub use manager::{JobHandle, JobManager};
pub use types::{FailedItem, JobKey, JobRecord, JobStatus, Progress};
