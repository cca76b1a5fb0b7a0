//! Local-filesystem demo collaborators: a directory of files stands in for an
//! object store, and a plain UTF-8 decode stands in for PDF extraction. Real
//! deployments supply their own [`crate::traits::ObjectStore`] /
//! [`crate::traits::PdfExtractor`] implementations.

use std::path::PathBuf;

use async_trait::async_trait;
use rcp_common::error::RcpError;

use crate::traits::{ObjectStore, PdfExtractor};

pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn list(&self) -> Result<Vec<String>, RcpError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            let mut out = Vec::new();
            let entries = std::fs::read_dir(&root)
                .map_err(|e| RcpError::ExternalUnavailable(format!("listing {}: {e}", root.display())))?;
            for entry in entries {
                let entry = entry.map_err(|e| RcpError::ExternalUnavailable(e.to_string()))?;
                if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                    if let Some(name) = entry.file_name().to_str() {
                        out.push(name.to_string());
                    }
                }
            }
            out.sort();
            Ok(out)
        })
        .await
        .map_err(|e| RcpError::Internal(e.to_string()))?
    }

    async fn get(&self, source_id: &str) -> Result<Vec<u8>, RcpError> {
        let path = self.root.join(source_id);
        tokio::fs::read(&path)
            .await
            .map_err(|e| RcpError::NotFound(format!("{}: {e}", path.display())))
    }
}

/// Treats input bytes as already-plain-text (UTF-8, lossily decoded).
/// Stand-in for a real OCR/PDF-to-text collaborator.
pub struct PlainTextExtractor;

#[async_trait]
impl PdfExtractor for PlainTextExtractor {
    async fn extract(&self, bytes: &[u8]) -> Result<String, RcpError> {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}
