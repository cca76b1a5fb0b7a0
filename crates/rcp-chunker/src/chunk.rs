//! C2: produces overlapping, size-bounded chunks carrying section metadata.

use crate::section::{ParsedDocument, Section};
use rcp_common::chunk_id::derive_chunk_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkingMethod {
    SectionAware,
    Fallback,
}

impl ChunkingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkingMethod::SectionAware => "section_aware",
            ChunkingMethod::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks of the same section, in characters.
    pub overlap: usize,
    /// When false, sections are concatenated (title-prefixed) before windowing.
    pub chunk_by_section: bool,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            overlap: 100,
            chunk_by_section: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Chunk {
    pub chunk_id: String,
    pub text: String,
    pub source_id: String,
    pub section_number: String,
    pub section_title: String,
    /// 0-based index within the section (or within the whole document when
    /// `chunk_by_section = false`).
    pub chunk_index: usize,
    pub chunking_method: ChunkingMethod,
}

/// Computes `(start, end)` char-index windows over a run of `len` characters.
///
/// Sliding windows of `chunk_size` advance by `chunk_size - overlap`. The
/// final window is adjusted in place: if its natural remainder is at least a
/// quarter of `chunk_size` it is shifted left so its length equals
/// `chunk_size`; otherwise it is dropped and its text folded into the
/// previous window so no orphan fragment survives.
fn compute_windows(len: usize, chunk_size: usize, overlap: usize) -> Vec<(usize, usize)> {
    if len <= chunk_size {
        return vec![(0, len)];
    }
    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut windows = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + chunk_size).min(len);
        windows.push((start, end));
        if end >= len {
            break;
        }
        start += step;
    }

    if windows.len() >= 2 {
        let last_idx = windows.len() - 1;
        let (last_start, last_end) = windows[last_idx];
        let remainder = last_end - last_start;
        if remainder < chunk_size {
            let quarter = chunk_size / 4;
            if remainder >= quarter {
                let shifted_start = len.saturating_sub(chunk_size);
                windows[last_idx] = (shifted_start, len);
            } else {
                windows.pop();
                let prev_idx = windows.len() - 1;
                windows[prev_idx].1 = len;
            }
        }
    }
    windows
}

/// Within the last 15% of a window (when it doesn't already end at the text
/// boundary), prefer to end at the nearest sentence terminator or newline.
fn apply_break_preference(chars: &[char], start: usize, end: usize) -> usize {
    if end >= chars.len() {
        return end;
    }
    let window_len = end - start;
    let search_from = start + ((window_len as f64) * 0.85) as usize;
    for i in (search_from..end).rev() {
        match chars[i] {
            '.' | '!' | '?' | '\n' => return i + 1,
            _ => continue,
        }
    }
    end
}

fn window_section_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    if len == 0 {
        return Vec::new();
    }
    let mut windows = compute_windows(len, chunk_size, overlap);
    for w in windows.iter_mut() {
        w.1 = apply_break_preference(&chars, w.0, w.1);
    }
    windows
        .into_iter()
        .map(|(s, e)| chars[s..e].iter().collect::<String>())
        .collect()
}

fn chunk_section(
    source_id: &str,
    section: &Section,
    config: &ChunkerConfig,
    method: ChunkingMethod,
) -> Vec<Chunk> {
    let texts = window_section_text(&section.text, config.chunk_size, config.overlap);
    texts
        .into_iter()
        .enumerate()
        .map(|(idx, text)| Chunk {
            chunk_id: derive_chunk_id(source_id, &section.number, idx),
            text,
            source_id: source_id.to_string(),
            section_number: section.number.clone(),
            section_title: section.title.clone(),
            chunk_index: idx,
            chunking_method: method,
        })
        .collect()
}

/// Produces the final chunk list for a parsed document.
pub fn chunk_document(source_id: &str, parsed: &ParsedDocument, config: &ChunkerConfig) -> Vec<Chunk> {
    let method = if parsed.used_fallback {
        ChunkingMethod::Fallback
    } else {
        ChunkingMethod::SectionAware
    };

    if config.chunk_by_section {
        parsed
            .sections
            .iter()
            .flat_map(|s| chunk_section(source_id, s, config, method))
            .collect()
    } else {
        let concatenated = parsed
            .sections
            .iter()
            .map(|s| format!("## {}\n{}", s.title, s.text))
            .collect::<Vec<_>>()
            .join("\n\n");
        let texts = window_section_text(&concatenated, config.chunk_size, config.overlap);
        texts
            .into_iter()
            .enumerate()
            .map(|(idx, text)| Chunk {
                chunk_id: derive_chunk_id(source_id, "0", idx),
                text,
                source_id: source_id.to_string(),
                section_number: "0".to_string(),
                section_title: String::new(),
                chunk_index: idx,
                chunking_method: method,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::parse_sections;

    #[test]
    fn short_section_yields_single_chunk() {
        let parsed = parse_sections(
            "1 ABSTRACT\nShort abstract text.\n2 BODY\nAlso short.\n",
        );
        let config = ChunkerConfig::default();
        let chunks = chunk_document("doc-1", &parsed, &config);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].chunking_method.as_str(), "section_aware");
    }

    #[test]
    fn fallback_chunking_respects_chunk_size_and_count_tolerance() {
        // 2000-char document, no recognizable headers, chunk_size=512, overlap=100.
        let body: String = "a".repeat(2000);
        let parsed = parse_sections(&body);
        assert!(parsed.used_fallback);

        let config = ChunkerConfig {
            chunk_size: 512,
            overlap: 100,
            chunk_by_section: true,
        };
        let chunks = chunk_document("doc-2", &parsed, &config);

        for c in &chunks {
            assert!(c.text.chars().count() <= 512);
            assert_eq!(c.chunking_method.as_str(), "fallback");
        }
        // invariant (spec §8): n = 1 if L<=chunk_size else ceil((L-overlap)/(chunk_size-overlap)) +/- 1
        let expected = ((2000.0 - 100.0) / (512.0 - 100.0)).ceil() as i64;
        let actual = chunks.len() as i64;
        assert!((actual - expected).abs() <= 1, "expected ~{expected}, got {actual}");
    }

    #[test]
    fn chunk_ids_are_deterministic() {
        let parsed = parse_sections("1 A\n".to_string().repeat(1).as_str());
        let config = ChunkerConfig::default();
        let a = chunk_document("doc-3", &parsed, &config);
        let b = chunk_document("doc-3", &parsed, &config);
        assert_eq!(
            a.iter().map(|c| c.chunk_id.clone()).collect::<Vec<_>>(),
            b.iter().map(|c| c.chunk_id.clone()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn overlap_preserves_section_text_up_to_whitespace() {
        // Concatenating non-overlapping spans recovers the original when overlap=0.
        let parsed = parse_sections("1 A\nBODY-ONLY-SECTION-TEXT-FOR-THIS-TEST\n2 B\nMore text.\n");
        let config = ChunkerConfig {
            chunk_size: 10,
            overlap: 0,
            chunk_by_section: true,
        };
        let chunks = chunk_document("doc-4", &parsed, &config);
        let first_section_chunks: String = chunks
            .iter()
            .filter(|c| c.section_number == "1")
            .map(|c| c.text.clone())
            .collect();
        assert_eq!(first_section_chunks, "BODY-ONLY-SECTION-TEXT-FOR-THIS-TEST");
    }
}
