//! Process-wide job registry (C10): owns long-running indexing jobs,
//! decoupling caller request lifetime from worker lifetime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::Utc;
use uuid::Uuid;

use crate::types::{FailedItem, JobKey, JobRecord, JobStatus, Progress};

struct Slot {
    record: JobRecord,
    cancel_flag: Arc<AtomicBool>,
}

/// Typed handle to the process-wide job registry. Cloning is cheap; all
/// clones share the same underlying table (§5: "no global mutable state
/// beyond the model caches and the Job Manager registry").
#[derive(Clone)]
pub struct JobManager {
    jobs: Arc<RwLock<HashMap<Uuid, Slot>>>,
    by_key: Arc<RwLock<HashMap<JobKey, Uuid>>>,
}

impl JobManager {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            by_key: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registers a pending job for `key`, or returns the existing job id if
    /// one for the same `(op, collection)` is already pending/running.
    pub fn start(&self, key: JobKey) -> Uuid {
        {
            let by_key = self.by_key.read().expect("by_key lock poisoned");
            if let Some(existing) = by_key.get(&key) {
                let jobs = self.jobs.read().expect("jobs lock poisoned");
                if let Some(slot) = jobs.get(existing) {
                    if !slot.record.status.is_terminal() {
                        return *existing;
                    }
                }
            }
        }

        let job_id = Uuid::new_v4();
        let record = JobRecord::new(job_id, key.clone());
        let cancel_flag = Arc::new(AtomicBool::new(false));
        self.jobs.write().expect("jobs lock poisoned").insert(job_id, Slot { record, cancel_flag });
        self.by_key.write().expect("by_key lock poisoned").insert(key, job_id);
        job_id
    }

    pub fn status(&self, job_id: Uuid) -> Option<JobRecord> {
        self.jobs.read().expect("jobs lock poisoned").get(&job_id).map(|s| s.record.clone())
    }

    /// Cooperatively signals cancellation; the worker observes this via
    /// [`JobHandle::is_cancelled`] at file boundaries.
    pub fn cancel(&self, job_id: Uuid) -> bool {
        let jobs = self.jobs.read().expect("jobs lock poisoned");
        match jobs.get(&job_id) {
            Some(slot) if !slot.record.status.is_terminal() => {
                slot.cancel_flag.store(true, Ordering::SeqCst);
                true
            }
            _ => false,
        }
    }

    pub fn mark_running(&self, job_id: Uuid) {
        let mut jobs = self.jobs.write().expect("jobs lock poisoned");
        if let Some(slot) = jobs.get_mut(&job_id) {
            if slot.record.status == JobStatus::Pending {
                slot.record.status = JobStatus::Running;
                slot.record.started_at = Some(Utc::now());
            }
        }
    }

    /// Returns a typed handle a worker uses to report progress and poll for
    /// cancellation without holding the registry lock across awaits.
    pub fn handle(&self, job_id: Uuid) -> JobHandle {
        JobHandle { manager: self.clone(), job_id }
    }

    fn update_progress(&self, job_id: Uuid, f: impl FnOnce(&mut Progress)) {
        let mut jobs = self.jobs.write().expect("jobs lock poisoned");
        if let Some(slot) = jobs.get_mut(&job_id) {
            let before = slot.record.progress.current;
            f(&mut slot.record.progress);
            // progress.current is monotonically non-regressing (§8).
            if slot.record.progress.current < before {
                slot.record.progress.current = before;
            }
        }
    }

    fn finish(&self, job_id: Uuid, status: JobStatus, result: Option<serde_json::Value>, error: Option<String>) {
        let mut jobs = self.jobs.write().expect("jobs lock poisoned");
        if let Some(slot) = jobs.get_mut(&job_id) {
            if !slot.record.status.is_terminal() {
                slot.record.status = status;
                slot.record.finished_at = Some(Utc::now());
                slot.record.result = result;
                slot.record.error = error;
            }
        }
    }

    fn is_cancelled(&self, job_id: Uuid) -> bool {
        self.jobs
            .read()
            .expect("jobs lock poisoned")
            .get(&job_id)
            .map(|s| s.cancel_flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-job handle held by a worker; cheap to clone, safe to hold across
/// `.await` points.
#[derive(Clone)]
pub struct JobHandle {
    manager: JobManager,
    job_id: Uuid,
}

impl JobHandle {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn mark_running(&self) {
        self.manager.mark_running(self.job_id);
    }

    pub fn is_cancelled(&self) -> bool {
        self.manager.is_cancelled(self.job_id)
    }

    pub fn set_total(&self, total: u64) {
        self.manager.update_progress(self.job_id, |p| p.total = total);
    }

    pub fn advance(&self, current_item: impl Into<String>) {
        self.manager.update_progress(self.job_id, |p| {
            p.current += 1;
            p.current_item = Some(current_item.into());
        });
    }

    pub fn record_ok(&self) {
        self.manager.update_progress(self.job_id, |p| p.processed_ok += 1);
    }

    pub fn record_failed(&self, id: impl Into<String>, reason: impl Into<String>) {
        self.manager.update_progress(self.job_id, |p| {
            p.processed_failed += 1;
            p.failed_items.push(FailedItem { id: id.into(), reason: reason.into() });
        });
    }

    pub fn complete(&self, result: serde_json::Value) {
        self.manager.finish(self.job_id, JobStatus::Completed, Some(result), None);
    }

    pub fn fail(&self, error: impl Into<String>) {
        self.manager.finish(self.job_id, JobStatus::Failed, None, Some(error.into()));
    }

    pub fn cancelled(&self) {
        self.manager.finish(self.job_id, JobStatus::Cancelled, None, Some("cancelled".to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_returns_existing_job_for_same_key() {
        let mgr = JobManager::new();
        let key = JobKey { op: "index".to_string(), collection: "demo".to_string() };
        let first = mgr.start(key.clone());
        let second = mgr.start(key);
        assert_eq!(first, second);
    }

    #[test]
    fn terminal_status_is_sticky() {
        let mgr = JobManager::new();
        let key = JobKey { op: "index".to_string(), collection: "demo".to_string() };
        let job_id = mgr.start(key);
        let handle = mgr.handle(job_id);
        handle.complete(serde_json::json!({"ok": true}));
        handle.fail("should not override");
        assert_eq!(mgr.status(job_id).unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn progress_current_never_regresses() {
        let mgr = JobManager::new();
        let key = JobKey { op: "index".to_string(), collection: "demo".to_string() };
        let job_id = mgr.start(key);
        let handle = mgr.handle(job_id);
        handle.advance("a");
        handle.advance("b");
        let after_two = mgr.status(job_id).unwrap().progress.current;
        assert_eq!(after_two, 2);
    }

    #[test]
    fn cancel_is_cooperative_not_immediate() {
        let mgr = JobManager::new();
        let key = JobKey { op: "index".to_string(), collection: "demo".to_string() };
        let job_id = mgr.start(key);
        let handle = mgr.handle(job_id);
        assert!(!handle.is_cancelled());
        assert!(mgr.cancel(job_id));
        assert!(handle.is_cancelled());
        assert_eq!(mgr.status(job_id).unwrap().status, JobStatus::Pending);
    }

    #[test]
    fn new_job_can_start_after_previous_one_for_key_terminates() {
        let mgr = JobManager::new();
        let key = JobKey { op: "index".to_string(), collection: "demo".to_string() };
        let first = mgr.start(key.clone());
        mgr.handle(first).complete(serde_json::json!({}));
        let second = mgr.start(key);
        assert_ne!(first, second);
    }
}
