//! C4: in-memory Okapi BM25 index state and scoring.

use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
struct TermEntry {
    index: u32,
    df: u32,
}

/// A single snapshot of BM25 corpus state. Immutable once built; updates
/// replace the whole snapshot (see [`crate::store::BM25Store`]).
#[derive(Debug, Clone)]
pub struct BM25Index {
    pub(crate) k1: f64,
    pub(crate) b: f64,
    pub(crate) chunk_ids: Vec<String>,
    pub(crate) doc_lengths: Vec<u32>,
    pub(crate) avgdl: f64,
    vocab: HashMap<String, TermEntry>,
    pub(crate) term_by_index: Vec<String>,
    pub(crate) doc_postings: Vec<Vec<(u32, u32)>>,
    inverted: HashMap<u32, Vec<(u32, u32)>>,
    total_tokens: u64,
}

impl BM25Index {
    pub fn new(k1: f64, b: f64) -> Self {
        Self {
            k1,
            b,
            chunk_ids: Vec::new(),
            doc_lengths: Vec::new(),
            avgdl: 0.0,
            vocab: HashMap::new(),
            term_by_index: Vec::new(),
            doc_postings: Vec::new(),
            inverted: HashMap::new(),
            total_tokens: 0,
        }
    }

    pub fn k1(&self) -> f64 {
        self.k1
    }

    pub fn b(&self) -> f64 {
        self.b
    }

    pub fn n_docs(&self) -> u64 {
        self.chunk_ids.len() as u64
    }

    pub fn avgdl(&self) -> f64 {
        self.avgdl
    }

    pub fn chunk_ids(&self) -> &[String] {
        &self.chunk_ids
    }

    pub fn is_empty(&self) -> bool {
        self.chunk_ids.is_empty()
    }

    /// Vocabulary terms in `term_by_index` order together with their
    /// document frequency, for persistence.
    pub(crate) fn vocab_with_df(&self) -> Vec<(String, u32)> {
        self.term_by_index
            .iter()
            .map(|term| {
                let df = self.vocab.get(term).map(|e| e.df).unwrap_or(0);
                (term.clone(), df)
            })
            .collect()
    }

    /// Appends documents, updating `N`, `avgdl`, and document frequencies.
    /// Deterministic: identical input (in order) produces identical state,
    /// because per-document term iteration is ordered via a `BTreeMap`
    /// rather than relying on hash-map iteration order.
    pub fn add_documents(&mut self, items: &[(String, Vec<String>)]) {
        for (chunk_id, tokens) in items {
            let doc_index = self.chunk_ids.len() as u32;
            let mut term_freq: BTreeMap<&str, u32> = BTreeMap::new();
            for tok in tokens {
                *term_freq.entry(tok.as_str()).or_insert(0) += 1;
            }

            let mut postings = Vec::with_capacity(term_freq.len());
            for (term, tf) in term_freq.iter() {
                let term_index = match self.vocab.get_mut(*term) {
                    Some(entry) => {
                        entry.df += 1;
                        entry.index
                    }
                    None => {
                        let idx = self.term_by_index.len() as u32;
                        self.term_by_index.push((*term).to_string());
                        self.vocab.insert((*term).to_string(), TermEntry { index: idx, df: 1 });
                        idx
                    }
                };
                postings.push((term_index, *tf));
                self.inverted
                    .entry(term_index)
                    .or_default()
                    .push((doc_index, *tf));
            }

            self.chunk_ids.push(chunk_id.clone());
            self.doc_lengths.push(tokens.len() as u32);
            self.doc_postings.push(postings);
            self.total_tokens += tokens.len() as u64;
        }
        self.avgdl = if self.chunk_ids.is_empty() {
            0.0
        } else {
            self.total_tokens as f64 / self.chunk_ids.len() as f64
        };
    }

    fn idf(&self, df: u32) -> f64 {
        let n = self.n_docs() as f64;
        let df = df as f64;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Scores `q_tokens` against every document containing at least one
    /// query term, returns the top `top_k` sorted by descending score with
    /// ties broken by ascending internal doc index.
    pub fn query(&self, q_tokens: &[String], top_k: usize) -> Vec<(String, f64)> {
        if self.is_empty() {
            return Vec::new();
        }
        let mut scores: HashMap<u32, f64> = HashMap::new();
        for tok in q_tokens {
            let Some(entry) = self.vocab.get(tok) else {
                continue;
            };
            let idf = self.idf(entry.df);
            let Some(postings) = self.inverted.get(&entry.index) else {
                continue;
            };
            for &(doc_index, tf) in postings {
                let doc_len = self.doc_lengths[doc_index as usize] as f64;
                let tf = tf as f64;
                let denom = tf + self.k1 * (1.0 - self.b + self.b * doc_len / self.avgdl.max(1e-9));
                let contribution = idf * (tf * (self.k1 + 1.0)) / denom;
                *scores.entry(doc_index).or_insert(0.0) += contribution;
            }
        }

        let mut ranked: Vec<(u32, f64)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        ranked
            .into_iter()
            .take(top_k)
            .map(|(doc_index, score)| (self.chunk_ids[doc_index as usize].clone(), score))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(|w| w.to_string()).collect()
    }

    #[test]
    fn literal_single_term_query_scenario() {
        let mut idx = BM25Index::new(1.5, 0.75);
        idx.add_documents(&[
            ("a".to_string(), toks("the quick brown fox")),
            ("b".to_string(), toks("lazy dog")),
            ("c".to_string(), toks("quick dog")),
        ]);
        let results = idx.query(&toks("quick"), 10);
        let ids: Vec<&str> = results.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids[0], "a");
        assert_eq!(ids[1], "c");
        assert!(!ids.contains(&"b") || ids.iter().position(|x| *x == "b").unwrap() > 1);
    }

    #[test]
    fn deterministic_add_then_query() {
        let mut a = BM25Index::new(1.5, 0.75);
        let mut b = BM25Index::new(1.5, 0.75);
        let docs = vec![
            ("x1".to_string(), toks("alpha beta gamma")),
            ("x2".to_string(), toks("beta gamma delta")),
        ];
        a.add_documents(&docs);
        b.add_documents(&docs);
        assert_eq!(a.query(&toks("beta"), 5), b.query(&toks("beta"), 5));
    }

    #[test]
    fn unknown_term_contributes_nothing() {
        let mut idx = BM25Index::new(1.5, 0.75);
        idx.add_documents(&[("a".to_string(), toks("alpha beta"))]);
        assert!(idx.query(&toks("zzz"), 5).is_empty());
    }
}
