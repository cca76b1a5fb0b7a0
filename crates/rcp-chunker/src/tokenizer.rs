//! C3: lexical tokenization for the BM25 index and lexical query processing.
//!
//! Not used by the embedding model, which tokenizes with its own subword
//! vocabulary (see `rcp-embed`).

use regex::Regex;
use std::sync::OnceLock;

/// Matches runs of letters/digits optionally joined by internal hyphens, so
/// `"5-Fluorouracil"` tokenizes as one token rather than splitting on `-`.
fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[\p{L}\p{N}]+(?:-[\p{L}\p{N}]+)*").expect("valid token regex")
    })
}

/// Tokenizes text for lexical indexing: lowercase (case-folded), split on
/// whitespace/punctuation except for letter/digit runs joined by internal
/// hyphens, numeric tokens retained, no stopword removal.
pub fn tokenize(text: &str) -> Vec<String> {
    let folded = text.to_lowercase();
    token_re()
        .find_iter(&folded)
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_domain_token() {
        assert_eq!(tokenize("5-Fluorouracil"), vec!["5-fluorouracil"]);
    }

    #[test]
    fn splits_on_punctuation_and_lowercases() {
        assert_eq!(tokenize("Drug A, Drug B"), vec!["drug", "a", "drug", "b"]);
    }

    #[test]
    fn retains_numeric_tokens() {
        assert_eq!(tokenize("dose 15 mg/kg"), vec!["dose", "15", "mg", "kg"]);
    }

    #[test]
    fn empty_input_yields_no_tokens() {
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn hyphenated_compound_stays_joined_but_slash_splits() {
        assert_eq!(tokenize("non-small-cell lung/cancer"), vec!["non-small-cell", "lung", "cancer"]);
    }
}
