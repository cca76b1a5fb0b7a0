//! Single-writer/multi-reader wrapper publishing immutable [`BM25Index`]
//! snapshots, per the concurrency model: readers acquire a consistent
//! snapshot atomically, writers replace it wholesale.

use crate::codec;
use crate::model::BM25Index;
use rcp_common::error::RcpError;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

pub struct BM25Store {
    data_dir: PathBuf,
    collection: String,
    snapshot: RwLock<Arc<BM25Index>>,
}

impl BM25Store {
    pub fn new(data_dir: impl Into<PathBuf>, collection: impl Into<String>, k1: f64, b: f64) -> Self {
        Self {
            data_dir: data_dir.into(),
            collection: collection.into(),
            snapshot: RwLock::new(Arc::new(BM25Index::new(k1, b))),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.data_dir.join(format!("bm25_index_{}.bin", self.collection))
    }

    /// Loads persisted state if present; a missing file leaves the empty
    /// in-memory index in place, a corrupt file surfaces its error.
    pub fn load_if_present(&self) -> Result<(), RcpError> {
        let path = self.path();
        if !path.exists() {
            return Ok(());
        }
        let loaded = codec::load(&path)?;
        *self.snapshot.write().expect("bm25 snapshot lock poisoned") = Arc::new(loaded);
        Ok(())
    }

    /// Acquires the current immutable snapshot. Cheap: only clones an `Arc`.
    pub fn snapshot(&self) -> Arc<BM25Index> {
        self.snapshot.read().expect("bm25 snapshot lock poisoned").clone()
    }

    /// Single-writer append: builds a new snapshot from the current one plus
    /// `items`, then atomically publishes it. Callers are responsible for
    /// ensuring only one writer calls this per collection at a time.
    pub fn add_documents(&self, items: &[(String, Vec<String>)]) {
        let mut next = (*self.snapshot()).clone();
        next.add_documents(items);
        *self.snapshot.write().expect("bm25 snapshot lock poisoned") = Arc::new(next);
    }

    /// Atomically persists the current snapshot to disk.
    pub fn save(&self) -> Result<(), RcpError> {
        let path = self.path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RcpError::ExternalUnavailable(format!("creating bm25 data dir: {e}"))
            })?;
        }
        codec::save(&self.snapshot(), &path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), RcpError> {
        codec::save(&self.snapshot(), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_then_reopen_round_trips() {
        let dir = tempdir().unwrap();
        let store = BM25Store::new(dir.path(), "demo", 1.5, 0.75);
        store.add_documents(&[
            ("a".to_string(), vec!["quick".into(), "fox".into()]),
            ("b".to_string(), vec!["lazy".into(), "dog".into()]),
        ]);
        store.save().unwrap();

        let reopened = BM25Store::new(dir.path(), "demo", 1.5, 0.75);
        reopened.load_if_present().unwrap();
        assert_eq!(reopened.snapshot().n_docs(), 2);
    }

    #[test]
    fn missing_file_leaves_empty_index() {
        let dir = tempdir().unwrap();
        let store = BM25Store::new(dir.path(), "fresh", 1.5, 0.75);
        store.load_if_present().unwrap();
        assert!(store.snapshot().is_empty());
    }
}
