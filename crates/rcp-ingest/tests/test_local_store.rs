//! In-process tests for the demo local-filesystem collaborators (no network).

use rcp_ingest::{LocalObjectStore, ObjectStore, PdfExtractor, PlainTextExtractor};

#[tokio::test]
async fn local_store_lists_and_reads_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("doc-b.txt"), b"second").unwrap();
    std::fs::write(dir.path().join("doc-a.txt"), b"first").unwrap();

    let store = LocalObjectStore::new(dir.path());
    let listed = store.list().await.unwrap();
    assert_eq!(listed, vec!["doc-a.txt".to_string(), "doc-b.txt".to_string()]);

    let bytes = store.get("doc-a.txt").await.unwrap();
    assert_eq!(bytes, b"first");
}

#[tokio::test]
async fn local_store_reports_not_found_for_missing_key() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalObjectStore::new(dir.path());
    let err = store.get("missing.txt").await.unwrap_err();
    assert_eq!(err.as_kind(), "NotFound");
}

#[tokio::test]
async fn plain_text_extractor_decodes_utf8_lossily() {
    let extractor = PlainTextExtractor;
    let text = extractor.extract(b"4.1 SECTION\nbody text").await.unwrap();
    assert!(text.contains("SECTION"));
}
