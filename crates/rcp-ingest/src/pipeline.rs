//! Indexing pipeline (C9): turns a listing of source documents into
//! populated BM25 (C4) and vector-index (C5) state for a named collection.

use std::sync::Arc;
use std::time::Duration;

use rcp_bm25::BM25Store;
use rcp_chunker::chunk::{chunk_document, ChunkerConfig};
use rcp_chunker::section::parse_sections;
use rcp_chunker::tokenizer::tokenize;
use rcp_common::error::RcpError;
use rcp_embed::BiEncoder;
use rcp_jobs::JobHandle;
use rcp_vector::{VectorCollection, VectorRecord};
use tokio::sync::Semaphore;
use tracing::info;

use crate::report::{PerFileReport, Report};
use crate::traits::{ObjectStore, PdfExtractor};

const DEFAULT_MAX_CONCURRENT: usize = 20;
const DEFAULT_BATCH_SIZE: usize = 500;
const DEFAULT_FILE_TIMEOUT: Duration = Duration::from_secs(60);

pub struct PipelineConfig {
    pub max_concurrent: usize,
    pub batch_size: usize,
    pub use_section_chunking: bool,
    pub chunker: ChunkerConfig,
    /// Per-file wall-clock budget (§5); expiry fails the file with reason `"timeout"`.
    pub file_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            batch_size: DEFAULT_BATCH_SIZE,
            use_section_chunking: true,
            chunker: ChunkerConfig::default(),
            file_timeout: DEFAULT_FILE_TIMEOUT,
        }
    }
}

/// A file's extracted chunk records, staged for the single BM25 writer.
struct StagedFile {
    report: PerFileReport,
    bm25_items: Vec<(String, Vec<String>)>,
}

pub struct IndexingPipeline {
    store: Arc<dyn ObjectStore>,
    extractor: Arc<dyn PdfExtractor>,
    bm25: Arc<BM25Store>,
    vectors: Arc<VectorCollection>,
    embedder: Arc<BiEncoder>,
    config: PipelineConfig,
}

impl IndexingPipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        extractor: Arc<dyn PdfExtractor>,
        bm25: Arc<BM25Store>,
        vectors: Arc<VectorCollection>,
        embedder: Arc<BiEncoder>,
        config: PipelineConfig,
    ) -> Self {
        Self { store, extractor, bm25, vectors, embedder, config }
    }

    /// Processes every source the object store lists, skipping ones already
    /// present in the vector index (resume-safe), bounding concurrency at
    /// `max_concurrent`, and persisting BM25 periodically and at the end.
    pub async fn process_bucket(&self, job: &JobHandle) -> Result<Report, RcpError> {
        job.mark_running();
        let all_ids = self.store.list().await?;
        let mut report = Report { total_listed: all_ids.len(), ..Default::default() };

        let mut pending = Vec::with_capacity(all_ids.len());
        for id in all_ids {
            if self.vectors.source_exists(&id).await? {
                report.skipped_already_indexed += 1;
            } else {
                pending.push(id);
            }
        }
        job.set_total(pending.len() as u64);

        let checkpoint_every = (pending.len() / 20).max(1);
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        // Paired with the spawned handle so a panicked or timed-out task still
        // reports against its real source id, and so BM25 writes below apply
        // in `pending` (source) order regardless of completion order.
        let mut tasks = Vec::with_capacity(pending.len());

        for source_id in pending {
            if job.is_cancelled() {
                break;
            }
            let permit = semaphore.clone().acquire_owned().await.expect("semaphore not closed");
            let store = self.store.clone();
            let extractor = self.extractor.clone();
            let vectors = self.vectors.clone();
            let embedder = self.embedder.clone();
            let chunker = self.config.chunker.clone();
            let use_section_chunking = self.config.use_section_chunking;
            let file_timeout = self.config.file_timeout;
            let id_for_task = source_id.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let work = async {
                    let bytes = store.get(&id_for_task).await?;
                    process_one(&id_for_task, &bytes, extractor.as_ref(), &vectors, &embedder, &chunker, use_section_chunking).await
                };
                tokio::time::timeout(file_timeout, work)
                    .await
                    .unwrap_or_else(|_| Err(RcpError::Timeout("timeout".to_string())))
            });
            tasks.push((source_id, handle));
        }

        // Awaiting sequentially here (not `join_all`) is what makes the
        // resulting BM25 write order depend only on `pending`'s order, not on
        // which task happens to finish first (§4.9, §8 determinism).
        let mut completed = 0usize;
        for (source_id, handle) in tasks {
            let staged = match handle.await {
                Ok(Ok(staged)) => staged,
                Ok(Err(RcpError::Timeout(_))) => StagedFile {
                    report: PerFileReport { source_id: source_id.clone(), chunks_indexed: 0, error: Some("timeout".to_string()) },
                    bm25_items: Vec::new(),
                },
                Ok(Err(e)) => StagedFile {
                    report: PerFileReport { source_id: source_id.clone(), chunks_indexed: 0, error: Some(e.to_string()) },
                    bm25_items: Vec::new(),
                },
                Err(e) => StagedFile {
                    report: PerFileReport { source_id: source_id.clone(), chunks_indexed: 0, error: Some(format!("task panicked: {e}")) },
                    bm25_items: Vec::new(),
                },
            };

            job.advance(staged.report.source_id.clone());
            if let Some(reason) = &staged.report.error {
                report.processed_failed += 1;
                report.failed.push((staged.report.source_id.clone(), reason.clone()));
                job.record_failed(staged.report.source_id.clone(), reason.clone());
            } else {
                if !staged.bm25_items.is_empty() {
                    self.bm25.add_documents(&staged.bm25_items);
                }
                report.processed_ok += 1;
                report.chunks_indexed += staged.report.chunks_indexed;
                job.record_ok();
            }

            completed += 1;
            if completed % checkpoint_every == 0 {
                self.bm25.save()?;
            }
        }

        self.bm25.save()?;

        if job.is_cancelled() {
            job.cancelled();
        } else {
            job.complete(serde_json::json!({
                "processed_ok": report.processed_ok,
                "processed_failed": report.processed_failed,
                "chunks_indexed": report.chunks_indexed,
            }));
        }
        Ok(report)
    }

    /// Processes a single already-fetched document, applying its BM25 items
    /// directly (there is no concurrent sibling task to order against here).
    /// Used internally by tests and available to callers that want one-off,
    /// non-bulk indexing.
    pub async fn process_single(&self, source_id: &str, bytes: &[u8]) -> Result<PerFileReport, RcpError> {
        let work = process_one(
            source_id,
            bytes,
            self.extractor.as_ref(),
            &self.vectors,
            &self.embedder,
            &self.config.chunker,
            self.config.use_section_chunking,
        );
        let staged = tokio::time::timeout(self.config.file_timeout, work)
            .await
            .unwrap_or_else(|_| Err(RcpError::Timeout("timeout".to_string())))?;
        if !staged.bm25_items.is_empty() {
            self.bm25.add_documents(&staged.bm25_items);
        }
        Ok(staged.report)
    }
}

#[allow(clippy::too_many_arguments)]
async fn process_one(
    source_id: &str,
    bytes: &[u8],
    extractor: &dyn PdfExtractor,
    vectors: &VectorCollection,
    embedder: &BiEncoder,
    chunker: &ChunkerConfig,
    use_section_chunking: bool,
) -> Result<StagedFile, RcpError> {
    let text = extractor.extract(bytes).await.map_err(|e| RcpError::ParseError(e.to_string()))?;
    let parsed = parse_sections(&text);
    let mut config = chunker.clone();
    config.chunk_by_section = use_section_chunking;
    let chunks = chunk_document(source_id, &parsed, &config);

    if chunks.is_empty() {
        return Ok(StagedFile {
            report: PerFileReport { source_id: source_id.to_string(), chunks_indexed: 0, error: None },
            bm25_items: Vec::new(),
        });
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = embedder.encode(&texts).await.map_err(RcpError::from)?;

    let records: Vec<VectorRecord> = chunks
        .iter()
        .zip(embeddings)
        .map(|(c, vector)| VectorRecord {
            chunk_id: c.chunk_id.clone(),
            vector,
            text: c.text.clone(),
            source_id: c.source_id.clone(),
            section_number: c.section_number.clone(),
            section_title: c.section_title.clone(),
            chunk_index: c.chunk_index as i64,
        })
        .collect();

    // Computed here (dense work finishes alongside the vector upsert below)
    // but deliberately NOT applied to the BM25 writer in this function: the
    // caller applies `bm25_items` in deterministic source order, since this
    // function runs concurrently across files and must not race the single
    // BM25 writer (§4.9, §8 determinism).
    let bm25_items: Vec<(String, Vec<String>)> =
        chunks.iter().map(|c| (c.chunk_id.clone(), tokenize(&c.text))).collect();

    vectors.upsert_batch(&records, records.len().max(1)).await?;

    info!(source_id, n_chunks = chunks.len(), "file indexed");
    Ok(StagedFile {
        report: PerFileReport { source_id: source_id.to_string(), chunks_indexed: chunks.len(), error: None },
        bm25_items,
    })
}
