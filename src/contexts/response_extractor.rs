//! Pulls the file mapping out of a free-form generator reply.
//!
//! Replies often wrap the JSON object in prose or markdown fences. Three
//! strategies are available, selected by [`Strictness`]:
//!
//! - `Strict`: after stripping fences the reply must be exactly one object.
//! - `Balanced`: the first complete top-level object, found by tracking
//!   nesting depth and string literals, that decodes to a file mapping.
//!   Trailing text, including further objects, is ignored. A `{` that is
//!   never closed ends the search.
//! - `Greedy`: everything from the first `{` to the last `}`. Two objects, or
//!   a stray `}` after the object, produce a `Malformed` error.

use crate::data::{GeneratedFileSet, Strictness};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// No `{` ... `}` span in the reply
    NoObject { raw: String },
    /// An object was opened but never closed
    Unterminated { raw: String },
    /// A span was found but is not a JSON object of string values
    Malformed {
        raw: String,
        candidate: String,
        reason: String,
    },
}

impl ExtractionError {
    /// The unmodified reply, for diagnostics or a retry
    pub fn raw(&self) -> &str {
        match self {
            ExtractionError::NoObject { raw }
            | ExtractionError::Unterminated { raw }
            | ExtractionError::Malformed { raw, .. } => raw,
        }
    }
}

impl fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExtractionError::NoObject { raw } => {
                write!(f, "Could not find a JSON object in response: {}", raw)
            }
            ExtractionError::Unterminated { raw } => {
                write!(f, "JSON object in response is never closed: {}", raw)
            }
            ExtractionError::Malformed { raw, reason, .. } => {
                write!(f, "Failed to parse JSON from response: {}\nRaw content: {}", reason, raw)
            }
        }
    }
}

impl std::error::Error for ExtractionError {}

fn greedy_object_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"))
}

/// Extracts with the default (balanced) strategy
pub fn extract_json(raw: &str) -> Result<GeneratedFileSet, ExtractionError> {
    extract_with(raw, Strictness::Balanced)
}

pub fn extract_with(raw: &str, strictness: Strictness) -> Result<GeneratedFileSet, ExtractionError> {
    match strictness {
        Strictness::Strict => extract_strict(raw),
        Strictness::Balanced => extract_balanced(raw),
        Strictness::Greedy => extract_greedy(raw),
    }
}

fn parse_file_set(raw: &str, candidate: &str) -> Result<GeneratedFileSet, ExtractionError> {
    serde_json::from_str(candidate).map_err(|e| ExtractionError::Malformed {
        raw: raw.to_string(),
        candidate: candidate.to_string(),
        reason: e.to_string(),
    })
}

fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let clean = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    clean.strip_suffix("```").unwrap_or(clean).trim()
}

fn extract_strict(raw: &str) -> Result<GeneratedFileSet, ExtractionError> {
    let clean = strip_markdown_fences(raw);
    if !clean.starts_with('{') {
        return Err(ExtractionError::NoObject {
            raw: raw.to_string(),
        });
    }
    parse_file_set(raw, clean)
}

fn extract_greedy(raw: &str) -> Result<GeneratedFileSet, ExtractionError> {
    let Some(span) = greedy_object_re().find(raw) else {
        return Err(ExtractionError::NoObject {
            raw: raw.to_string(),
        });
    };
    parse_file_set(raw, span.as_str())
}

/// Byte index of the `}` closing the object that opens at `start`
fn closing_brace(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(start + i);
                }
            }
            _ => {}
        }
    }

    None
}

fn extract_balanced(raw: &str) -> Result<GeneratedFileSet, ExtractionError> {
    let mut first_error: Option<ExtractionError> = None;
    let mut search_from = 0;

    while let Some(offset) = raw[search_from..].find('{') {
        let start = search_from + offset;

        match closing_brace(raw, start) {
            Some(end) => {
                match parse_file_set(raw, &raw[start..=end]) {
                    Ok(files) => return Ok(files),
                    Err(e) => {
                        first_error.get_or_insert(e);
                    }
                }
                // the interior of a complete object is never a candidate
                search_from = end + 1;
            }
            None => {
                // every later brace is nested in this unclosed object
                first_error.get_or_insert(ExtractionError::Unterminated {
                    raw: raw.to_string(),
                });
                break;
            }
        }
    }

    Err(first_error.unwrap_or_else(|| ExtractionError::NoObject {
        raw: raw.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Strictness; 3] = [Strictness::Strict, Strictness::Balanced, Strictness::Greedy];

    #[test]
    fn test_prose_around_object_is_tolerated() {
        let raw = "Sure! {\"/tmp/proj/a.go\": \"line1\\nif err != nil {}\\nline3\"} Hope this helps.";
        for strictness in [Strictness::Balanced, Strictness::Greedy] {
            let files = extract_with(raw, strictness).unwrap();
            assert_eq!(files.len(), 1);
            assert_eq!(
                files.get("/tmp/proj/a.go"),
                Some("line1\nif err != nil {}\nline3")
            );
        }
    }

    #[test]
    fn test_plain_object_parses_in_every_mode() {
        let raw = r##"{"./main.go": "package main", "./README.md": "# My Project"}"##;
        for strictness in ALL {
            let files = extract_with(raw, strictness).unwrap();
            assert_eq!(files.get("./README.md"), Some("# My Project"));
        }
    }

    #[test]
    fn test_strict_rejects_prose_but_accepts_fences() {
        let fenced = "```json\n{\"a.txt\": \"hi\"}\n```";
        assert_eq!(extract_with(fenced, Strictness::Strict).unwrap().get("a.txt"), Some("hi"));

        let chatty = "Here you go: {\"a.txt\": \"hi\"}";
        assert!(matches!(
            extract_with(chatty, Strictness::Strict),
            Err(ExtractionError::NoObject { .. })
        ));

        let trailing = "{\"a.txt\": \"hi\"} done";
        assert!(matches!(
            extract_with(trailing, Strictness::Strict),
            Err(ExtractionError::Malformed { .. })
        ));
    }

    #[test]
    fn test_no_object_carries_raw_text() {
        for strictness in ALL {
            let err = extract_with("I cannot help with that.", strictness).unwrap_err();
            assert!(matches!(err, ExtractionError::NoObject { .. }));
            assert_eq!(err.raw(), "I cannot help with that.");
        }
    }

    #[test]
    fn test_two_objects_break_greedy_but_not_balanced() {
        let raw = r#"{"a.txt": "1"} and also {"b.txt": "2"}"#;

        match extract_with(raw, Strictness::Greedy) {
            Err(ExtractionError::Malformed { candidate, .. }) => assert_eq!(candidate, raw),
            other => panic!("Expected Malformed, got {:?}", other),
        }

        let files = extract_with(raw, Strictness::Balanced).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files.get("a.txt"), Some("1"));
    }

    #[test]
    fn test_trailing_brace_breaks_greedy_but_not_balanced() {
        let raw = r#"{"a.go": "func f() { return }"} (closing brace: })"#;
        assert!(matches!(
            extract_with(raw, Strictness::Greedy),
            Err(ExtractionError::Malformed { .. })
        ));
        let files = extract_with(raw, Strictness::Balanced).unwrap();
        assert_eq!(files.get("a.go"), Some("func f() { return }"));
    }

    #[test]
    fn test_balanced_handles_escaped_quotes_and_braces_in_strings() {
        let raw = r#"Result: {"x.js": "const s = \"}\"; if (a) { b(); }"} end"#;
        let files = extract_json(raw).unwrap();
        assert_eq!(files.get("x.js"), Some(r#"const s = "}"; if (a) { b(); }"#));
    }

    #[test]
    fn test_balanced_skips_prose_braces_before_object() {
        let raw = r#"Use {placeholders} carefully. {"a.txt": "ok"}"#;
        let files = extract_json(raw).unwrap();
        assert_eq!(files.get("a.txt"), Some("ok"));
    }

    #[test]
    fn test_balanced_never_returns_a_nested_object() {
        let raw = r#"{"a.txt": {"inner": "value"}}"#;
        let err = extract_json(raw).unwrap_err();
        match err {
            ExtractionError::Malformed { candidate, .. } => assert_eq!(candidate, raw),
            other => panic!("Expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_unterminated_object() {
        let err = extract_json(r#"{"a.txt": "never closed"#).unwrap_err();
        assert!(matches!(err, ExtractionError::Unterminated { .. }));
    }

    #[test]
    fn test_unclosed_brace_hides_everything_after_it() {
        let raw = r#"Partial answer { then {"a.txt": "x"}"#;
        assert!(matches!(
            extract_json(raw),
            Err(ExtractionError::Unterminated { .. })
        ));
    }

    #[test]
    fn test_many_unclosed_braces_fail_fast() {
        let raw = "{".repeat(200_000);
        assert!(matches!(
            extract_json(&raw),
            Err(ExtractionError::Unterminated { .. })
        ));
    }

    #[test]
    fn test_non_string_values_are_malformed() {
        for strictness in ALL {
            let err = extract_with(r#"{"a.txt": 42}"#, strictness).unwrap_err();
            assert!(matches!(err, ExtractionError::Malformed { .. }));
        }
    }

    #[test]
    fn test_round_trip_with_prefix_and_suffix() {
        let mut expected = GeneratedFileSet::new();
        expected.insert("/proj/a.go", "package a\n");
        expected.insert("/proj/b.go", "tab\there \"quoted\"");
        let object = serde_json::to_string(&expected).unwrap();

        for (prefix, suffix) in [("", ""), ("Here:\n", "\nThanks."), ("```json\n", "\n```")] {
            let raw = format!("{}{}{}", prefix, object, suffix);
            assert_eq!(extract_json(&raw).unwrap(), expected);
            assert_eq!(extract_with(&raw, Strictness::Greedy).unwrap(), expected);
        }
    }
}
