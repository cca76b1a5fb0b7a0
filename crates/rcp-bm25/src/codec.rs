//! Binary persistence for [`crate::model::BM25Index`], matching the
//! machine-independent file layout documented for `data/bm25_index_<collection>.bin`.

use crate::model::BM25Index;
use rcp_common::error::RcpError;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

const MAGIC: &[u8; 8] = b"BM25IDX\0";
const FORMAT_VERSION: u32 = 1;

fn io_err(e: std::io::Error) -> RcpError {
    RcpError::ExternalUnavailable(format!("bm25 index io error: {e}"))
}

/// Serializes `index` to bytes in the documented layout (everything except
/// the trailing CRC32 trailer).
fn encode_body(index: &BM25Index) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&index.k1().to_le_bytes());
    buf.extend_from_slice(&index.b().to_le_bytes());
    buf.extend_from_slice(&index.n_docs().to_le_bytes());
    buf.extend_from_slice(&index.avgdl().to_le_bytes());
    buf.extend_from_slice(&(index.term_by_index.len() as u64).to_le_bytes());

    for (term, df) in index.vocab_with_df() {
        let bytes = term.as_bytes();
        buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(bytes);
        buf.extend_from_slice(&df.to_le_bytes());
    }

    for chunk_id in &index.chunk_ids {
        let bytes = chunk_id.as_bytes();
        buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(bytes);
    }

    for (doc_idx, postings) in index.doc_postings.iter().enumerate() {
        buf.extend_from_slice(&(postings.len() as u32).to_le_bytes());
        for &(term_index, tf) in postings {
            buf.extend_from_slice(&term_index.to_le_bytes());
            buf.extend_from_slice(&tf.to_le_bytes());
        }
        buf.extend_from_slice(&index.doc_lengths[doc_idx].to_le_bytes());
    }

    buf
}

/// Writes `index` to `path` via write-to-temp-then-rename, so a reader never
/// observes a partially written file.
pub fn save(index: &BM25Index, path: &Path) -> Result<(), RcpError> {
    let body = encode_body(index);
    let crc = crc32fast::hash(&body);

    let tmp_path = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&tmp_path).map_err(io_err)?;
        file.write_all(&body).map_err(io_err)?;
        file.write_all(&crc.to_le_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
    }
    fs::rename(&tmp_path, path).map_err(io_err)?;
    Ok(())
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], RcpError> {
        if self.pos + n > self.buf.len() {
            return Err(RcpError::IndexCorrupt("bm25 index truncated".to_string()));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32, RcpError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64, RcpError> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn f64(&mut self) -> Result<f64, RcpError> {
        Ok(f64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn string(&mut self) -> Result<String, RcpError> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| RcpError::IndexCorrupt(format!("invalid utf8 in bm25 index: {e}")))
    }
}

/// Loads and validates a BM25 index file. A corrupt file (bad magic, bad
/// CRC, unsupported version) surfaces as [`RcpError::IndexCorrupt`] rather
/// than a generic I/O error, per the "treated as absent, rebuild required"
/// contract.
pub fn load(path: &Path) -> Result<BM25Index, RcpError> {
    let mut file = fs::File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            RcpError::NotFound(format!("bm25 index not found at {}", path.display()))
        } else {
            io_err(e)
        }
    })?;
    let mut raw = Vec::new();
    file.read_to_end(&mut raw).map_err(io_err)?;

    if raw.len() < 8 + 4 {
        return Err(RcpError::IndexCorrupt("bm25 index too short".to_string()));
    }
    let body_len = raw.len() - 4;
    let (body, trailer) = raw.split_at(body_len);
    let stored_crc = u32::from_le_bytes(trailer.try_into().unwrap());
    let actual_crc = crc32fast::hash(body);
    if stored_crc != actual_crc {
        return Err(RcpError::IndexCorrupt("bm25 index CRC mismatch".to_string()));
    }

    let mut r = Reader::new(body);
    let magic = r.take(8)?;
    if magic != MAGIC {
        return Err(RcpError::IndexCorrupt("bm25 index bad magic".to_string()));
    }
    let version = r.u32()?;
    if version != FORMAT_VERSION {
        return Err(RcpError::IndexCorrupt(format!(
            "unsupported bm25 index format version {version}"
        )));
    }
    let k1 = r.f64()?;
    let b = r.f64()?;
    let n_docs = r.u64()?;
    let _avgdl_stored = r.f64()?;
    let vocab_size = r.u64()?;

    let mut terms = Vec::with_capacity(vocab_size as usize);
    for _ in 0..vocab_size {
        let term = r.string()?;
        let _df = r.u32()?;
        terms.push(term);
    }

    let mut chunk_ids = Vec::with_capacity(n_docs as usize);
    for _ in 0..n_docs {
        chunk_ids.push(r.string()?);
    }

    let mut index = BM25Index::new(k1, b);
    let mut docs: Vec<(String, Vec<String>)> = Vec::with_capacity(n_docs as usize);
    for doc_i in 0..n_docs as usize {
        let tf_count = r.u32()? as usize;
        let mut tokens = Vec::new();
        for _ in 0..tf_count {
            let term_index = r.u32()? as usize;
            let tf = r.u32()?;
            let term = terms.get(term_index).ok_or_else(|| {
                RcpError::IndexCorrupt("bm25 index term index out of range".to_string())
            })?;
            for _ in 0..tf {
                tokens.push(term.clone());
            }
        }
        let doc_len = r.u32()?;
        // doc_len may exceed reconstructed token count only if the corpus
        // was indexed with stopword-filtered tokens that still counted
        // toward length; this implementation does not filter, so they match.
        debug_assert!(tokens.len() as u32 <= doc_len.max(tokens.len() as u32));
        docs.push((chunk_ids[doc_i].clone(), tokens));
    }
    index.add_documents(&docs);
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(|w| w.to_string()).collect()
    }

    #[test]
    fn round_trip_preserves_query_results() {
        let mut idx = BM25Index::new(1.5, 0.75);
        idx.add_documents(&[
            ("a".to_string(), toks("the quick brown fox")),
            ("b".to_string(), toks("lazy dog")),
            ("c".to_string(), toks("quick dog")),
        ]);
        let before = idx.query(&toks("quick dog"), 10);

        let dir = tempdir().unwrap();
        let path = dir.path().join("bm25_index_test.bin");
        save(&idx, &path).unwrap();
        let loaded = load(&path).unwrap();
        let after = loaded.query(&toks("quick dog"), 10);

        assert_eq!(before, after);
    }

    #[test]
    fn corrupt_file_reports_index_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bm25_index_bad.bin");
        fs::write(&path, b"not a valid bm25 file").unwrap();
        let err = load(&path).unwrap_err();
        assert!(matches!(err, RcpError::IndexCorrupt(_)));
    }

    #[test]
    fn missing_file_reports_not_found() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("does_not_exist.bin");
        let err = load(&path).unwrap_err();
        assert!(matches!(err, RcpError::NotFound(_)));
    }
}
