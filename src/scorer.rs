//! Pure ranked-search scoring function. No state, no I/O: `score` is safe to
//! call from any thread and is the sole arbiter of `CodeIndex::search`
//! ordering.

use crate::symbol::Symbol;
use std::collections::HashSet;

/// A normalized query: the raw lowercase string plus its whitespace-split
/// token set. Building this once per search call avoids re-splitting for
/// every candidate symbol.
pub struct Query {
    q: String,
    qw: HashSet<String>,
}

impl Query {
    pub fn new(raw: &str) -> Self {
        let q = raw.to_lowercase();
        let qw = q.split_whitespace().map(|s| s.to_string()).collect();
        Query { q, qw }
    }
}

/// Score a symbol against a normalized query. Returns 0 when nothing
/// matched; `CodeIndex::search` drops zero-score symbols.
pub fn score(symbol: &Symbol, query: &Query) -> u32 {
    let mut total: u32 = 0;

    let name = symbol.name.to_lowercase();
    let signature = symbol.signature.to_lowercase();
    let summary = symbol.summary.to_lowercase();
    let docstring = symbol.docstring.to_lowercase();

    if query.q == name {
        total += 20;
    } else if name.contains(&query.q) {
        total += 10;
    }
    for w in &query.qw {
        if name.contains(w.as_str()) {
            total += 5;
        }
    }

    if signature.contains(&query.q) {
        total += 8;
    }
    for w in &query.qw {
        if signature.contains(w.as_str()) {
            total += 2;
        }
    }

    if !summary.is_empty() && summary.contains(&query.q) {
        total += 5;
    }
    for w in &query.qw {
        if summary.contains(w.as_str()) {
            total += 1;
        }
    }

    let keyword_set: HashSet<&str> = symbol.keywords.iter().map(|k| k.as_str()).collect();
    let overlap = query.qw.iter().filter(|w| keyword_set.contains(w.as_str())).count();
    total += (overlap as u32) * 3;

    for w in &query.qw {
        if docstring.contains(w.as_str()) {
            total += 1;
        }
    }

    total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(name: &str, signature: &str) -> Symbol {
        Symbol {
            id: format!("f.py::{name}"),
            file: "f.py".into(),
            name: name.into(),
            qualified_name: name.into(),
            kind: "function".into(),
            language: "python".into(),
            signature: signature.into(),
            docstring: String::new(),
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
    fn exact_name_beats_substring_name() {
        let q = Query::new("delete_user");
        let exact = symbol("delete_user", "def delete_user(self):");
        let substring = symbol("delete_user_batch", "def delete_user_batch(self):");
        assert!(score(&exact, &q) > score(&substring, &q));
    }

    #[test]
    fn substring_name_beats_signature_only() {
        let q = Query::new("retry");
        let name_hit = symbol("retry_policy", "def retry_policy():");
        let sig_only = symbol("other", "def other(retry_count):");
        assert!(score(&name_hit, &q) > score(&sig_only, &q));
    }

    #[test]
    fn zero_score_for_no_match() {
        let q = Query::new("zzz_no_match");
        let s = symbol("login", "def login():");
        assert_eq!(score(&s, &q), 0);
    }

    #[test]
    fn keyword_overlap_contributes() {
        let q = Query::new("user service");
        let mut s = symbol("login", "def login():");
        s.keywords = vec!["user".into(), "service".into()];
        assert_eq!(score(&s, &q), 6);
    }
}
