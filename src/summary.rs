//! The pluggable one-line summary generator. Ships with a deterministic
//! fallback only; the ingest pipeline takes `&dyn Summarizer` so a host can
//! substitute an LLM-backed implementation without touching the core.

use crate::symbol::Symbol;

pub trait Summarizer {
    fn summarize(&self, symbol: &Symbol) -> String;
}

/// First non-empty line of the docstring, else the signature truncated to a
/// reasonable length.
pub struct FallbackSummarizer;

impl Summarizer for FallbackSummarizer {
    fn summarize(&self, symbol: &Symbol) -> String {
        if let Some(line) = symbol.docstring.lines().map(str::trim).find(|l| !l.is_empty()) {
            return line.to_string();
        }
        truncate(&symbol.signature, 120)
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut end = 0;
    for (i, _) in s.char_indices() {
        if i > max_chars {
            break;
        }
        end = i;
    }
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(docstring: &str, signature: &str) -> Symbol {
        Symbol {
            id: "f.py::foo".into(),
            file: "f.py".into(),
            name: "foo".into(),
            qualified_name: "foo".into(),
            kind: "function".into(),
            language: "python".into(),
            signature: signature.into(),
            docstring: docstring.into(),
            summary: String::new(),
            decorators: vec![],
            keywords: vec![],
            parent: None,
            line: 1,
            end_line: 2,
            byte_offset: 0,
            byte_length: 10,
            content_hash: String::new(),
        }
    }

    #[test]
    fn uses_first_docstring_line() {
        let s = symbol("Fetch a user by id.\n\nRaises if missing.", "def foo():");
        assert_eq!(FallbackSummarizer.summarize(&s), "Fetch a user by id.");
    }

    #[test]
    fn falls_back_to_signature_when_no_docstring() {
        let s = symbol("", "def get_user(self, user_id: int) -> User:");
        assert_eq!(FallbackSummarizer.summarize(&s), "def get_user(self, user_id: int) -> User:");
    }

    #[test]
    fn truncates_long_signature() {
        let long_sig = format!("def foo({}):", "x".repeat(200));
        let s = symbol("", &long_sig);
        let summary = FallbackSummarizer.summarize(&s);
        assert!(summary.ends_with("..."));
        assert!(summary.chars().count() <= 124);
    }
}
