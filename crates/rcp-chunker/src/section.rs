//! C1: splits raw extracted RCP text into numbered sections with titles.

use regex::Regex;
use std::sync::OnceLock;

/// A single numbered section of an RCP document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// e.g. "4.3", "4", or "0" for the synthetic preamble/fallback section.
    pub number: String,
    pub title: String,
    pub text: String,
    /// Position in discovery order, starting at 0.
    pub ordinal: usize,
}

/// Output of parsing a document into sections.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub sections: Vec<Section>,
    /// True when fewer than two headers were recognized and the whole
    /// document collapsed into a single `FULL_TEXT` section.
    pub used_fallback: bool,
}

fn header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+(?:\.\d+)*)\s+(.+?)\s*$").expect("valid header regex"))
}

/// A header's title run must be either all-uppercase (ignoring non-letters,
/// Unicode-aware so accented Romanian uppercase letters count) or title-cased
/// word-by-word.
fn is_valid_title(candidate: &str) -> bool {
    let letters: Vec<char> = candidate.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.is_empty() {
        return false;
    }
    let all_upper = letters.iter().all(|c| c.is_uppercase());
    if all_upper {
        return true;
    }
    candidate
        .split_whitespace()
        .all(|word| word.chars().next().map(char::is_uppercase).unwrap_or(false))
}

/// Joins a trailing-hyphenated line with the following line ("administra-\ntion" -> "administration")
/// and collapses interior whitespace runs to a single space.
fn normalize_section_text(lines: &[&str]) -> String {
    let mut joined = String::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i].trim();
        if let Some(stripped) = line.strip_suffix('-') {
            if i + 1 < lines.len() && !stripped.is_empty() {
                joined.push_str(stripped);
                i += 1;
                continue;
            }
        }
        joined.push_str(line);
        joined.push(' ');
        i += 1;
    }
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parses raw text into an ordered list of [`Section`]s. Never fails: a
/// document with no recognizable headers becomes a single fallback section.
pub fn parse_sections(text: &str) -> ParsedDocument {
    let lines: Vec<&str> = text.lines().collect();
    let re = header_re();

    struct Header {
        line_idx: usize,
        number: String,
        title: String,
    }

    let mut headers = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        if let Some(caps) = re.captures(line.trim_end()) {
            let number = caps.get(1).unwrap().as_str().to_string();
            let title_raw = caps.get(2).unwrap().as_str().to_string();
            if is_valid_title(&title_raw) {
                headers.push(Header {
                    line_idx: idx,
                    number,
                    title: title_raw,
                });
            }
        }
    }

    if headers.len() < 2 {
        let full = normalize_section_text(&lines);
        return ParsedDocument {
            sections: vec![Section {
                number: "0".to_string(),
                title: "FULL_TEXT".to_string(),
                text: full,
                ordinal: 0,
            }],
            used_fallback: true,
        };
    }

    let mut sections = Vec::new();
    let mut ordinal = 0usize;

    if headers[0].line_idx > 0 {
        let preamble = normalize_section_text(&lines[0..headers[0].line_idx]);
        if !preamble.is_empty() {
            sections.push(Section {
                number: "0".to_string(),
                title: "PREAMBLE".to_string(),
                text: preamble,
                ordinal,
            });
            ordinal += 1;
        }
    }

    for (i, header) in headers.iter().enumerate() {
        let body_start = header.line_idx + 1;
        let body_end = headers.get(i + 1).map(|h| h.line_idx).unwrap_or(lines.len());
        let body = normalize_section_text(&lines[body_start..body_end]);
        sections.push(Section {
            number: header.number.clone(),
            title: header.title.clone(),
            text: body,
            ordinal,
        });
        ordinal += 1;
    }

    ParsedDocument {
        sections,
        used_fallback: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_literal_section_scenario() {
        let text = "4.1 INDICAȚII TERAPEUTICE\nDrug X is indicated for Y.\n4.2 DOZE ŞI MOD DE ADMINISTRARE\nThe daily dose is 15 mg/kg.\n";
        let parsed = parse_sections(text);
        assert!(!parsed.used_fallback);
        assert_eq!(parsed.sections.len(), 2);
        assert_eq!(parsed.sections[0].number, "4.1");
        assert_eq!(parsed.sections[0].title, "INDICAȚII TERAPEUTICE");
        assert_eq!(parsed.sections[0].text, "Drug X is indicated for Y.");
        assert_eq!(parsed.sections[1].number, "4.2");
        assert_eq!(parsed.sections[1].title, "DOZE ŞI MOD DE ADMINISTRARE");
        assert_eq!(parsed.sections[1].text, "The daily dose is 15 mg/kg.");
    }

    #[test]
    fn no_headers_falls_back() {
        let text = "just some plain text with no section markers at all.";
        let parsed = parse_sections(text);
        assert!(parsed.used_fallback);
        assert_eq!(parsed.sections.len(), 1);
        assert_eq!(parsed.sections[0].number, "0");
        assert_eq!(parsed.sections[0].title, "FULL_TEXT");
    }

    #[test]
    fn single_header_also_falls_back() {
        // fewer than two recognized headers => fallback, per spec.
        let text = "4.1 INDICAȚII TERAPEUTICE\nDrug X is indicated for Y.\n";
        let parsed = parse_sections(text);
        assert!(parsed.used_fallback);
        assert_eq!(parsed.sections.len(), 1);
    }

    #[test]
    fn preamble_captured_when_nonempty() {
        let text = "Leaflet header line.\n4.1 INDICAȚII TERAPEUTICE\nBody one.\n4.2 CONTRAINDICAȚII\nBody two.\n";
        let parsed = parse_sections(text);
        assert_eq!(parsed.sections.len(), 3);
        assert_eq!(parsed.sections[0].number, "0");
        assert_eq!(parsed.sections[0].title, "PREAMBLE");
        assert_eq!(parsed.sections[0].text, "Leaflet header line.");
    }

    #[test]
    fn title_cased_header_recognized() {
        let text = "1 First Section\nSome body text here.\n2 Second Section\nMore body text.\n";
        let parsed = parse_sections(text);
        assert!(!parsed.used_fallback);
        assert_eq!(parsed.sections[0].title, "First Section");
    }

    #[test]
    fn ordinals_assigned_in_discovery_order() {
        let text = "Preface.\n1 A\nbody a\n2 B\nbody b\n3 C\nbody c\n";
        let parsed = parse_sections(text);
        let ordinals: Vec<usize> = parsed.sections.iter().map(|s| s.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2, 3]);
    }
}
