//! The symbol record: a named syntactic construct extracted from one source
//! file, locatable by byte range, scorable in search, hashed for drift
//! detection.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Closed set of symbol kinds. Unknown values read back from an older or
/// foreign manifest are preserved as-is via `kind: String` rather than
/// coerced into this enum — see `Symbol::kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Class,
    Method,
    Constant,
    Type,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Method => "method",
            SymbolKind::Constant => "constant",
            SymbolKind::Type => "type",
        }
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the six languages this engine extracts symbols from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
    Typescript,
    Go,
    Rust,
    Java,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Typescript => "typescript",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Java => "java",
        }
    }

    /// Map a file extension to a language tag. Returns `None` for anything
    /// unrecognized rather than guessing.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "py" | "pyi" => Some(Language::Python),
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::Javascript),
            "ts" | "tsx" => Some(Language::Typescript),
            "go" => Some(Language::Go),
            "rs" => Some(Language::Rust),
            "java" => Some(Language::Java),
            _ => None,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named syntactic construct extracted from source, with enough metadata
/// to identify it stably, locate its bytes, rank it in search, and detect
/// drift between the indexed content and a later re-read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub id: String,
    pub file: String,
    pub name: String,
    pub qualified_name: String,
    pub kind: String,
    pub language: String,
    pub signature: String,
    #[serde(default)]
    pub docstring: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub decorators: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub parent: Option<String>,
    pub line: u32,
    pub end_line: u32,
    pub byte_offset: usize,
    pub byte_length: usize,
    #[serde(default)]
    pub content_hash: String,
}

/// Build the stable symbol id: `{file}::{qualified_name}#{kind}`, or without
/// the `#{kind}` suffix when `kind` is empty.
pub fn make_symbol_id(file: &str, qualified_name: &str, kind: &str) -> String {
    if kind.is_empty() {
        format!("{file}::{qualified_name}")
    } else {
        format!("{file}::{qualified_name}#{kind}")
    }
}

/// SHA-256 hex digest of a symbol's source bytes, used for drift detection.
pub fn compute_content_hash(source_bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_bytes);
    format!("{:x}", hasher.finalize())
}

/// Split `name`/`qualified_name` on case boundaries and non-alphanumerics,
/// lowercase, dedupe, drop anything shorter than 2 chars. Used to populate
/// `Symbol::keywords`.
pub fn extract_keywords(name: &str, qualified_name: &str) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    let mut out = Vec::new();
    for source in [name, qualified_name] {
        for token in split_on_case_and_punctuation(source) {
            let lower = token.to_lowercase();
            if lower.len() >= 2 && seen.insert(lower.clone()) {
                out.push(lower);
            }
        }
    }
    out
}

fn split_on_case_and_punctuation(s: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in s.chars() {
        if c.is_alphanumeric() {
            if c.is_uppercase() && prev_lower && !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            current.push(c);
            prev_lower = c.is_lowercase() || c.is_numeric();
        } else {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            prev_lower = false;
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Apply `~1`, `~2`, … suffixes in source order to any group of symbols
/// sharing the same computed id. Must run after `parent` ids are resolved
/// (parents are referenced by their pre-suffix id determined earlier in the
/// walk) and is itself order-stable: the first occurrence in `symbols`
/// (source-byte order) gets `~1`.
pub fn disambiguate_ids(symbols: &mut [Symbol]) {
    use std::collections::HashMap;

    let mut counts: HashMap<String, usize> = HashMap::new();
    for s in symbols.iter() {
        *counts.entry(s.id.clone()).or_insert(0) += 1;
    }

    let mut seen_so_far: HashMap<String, usize> = HashMap::new();
    for s in symbols.iter_mut() {
        let total = *counts.get(&s.id).unwrap_or(&1);
        if total > 1 {
            let n = seen_so_far.entry(s.id.clone()).or_insert(0);
            *n += 1;
            s.id = format!("{}~{}", s.id, n);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_with_kind() {
        assert_eq!(
            make_symbol_id("src/main.py", "UserService.login", "method"),
            "src/main.py::UserService.login#method"
        );
    }

    #[test]
    fn id_without_kind() {
        assert_eq!(make_symbol_id("src/main.py", "FOO", ""), "src/main.py::FOO");
    }

    #[test]
    fn content_hash_is_sha256_hex() {
        let h = compute_content_hash(b"hello");
        assert_eq!(h.len(), 64);
        assert_eq!(h, "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824");
    }

    #[test]
    fn keywords_split_camel_and_punctuation() {
        let kws = extract_keywords("getUserById", "UserService.getUserById");
        assert!(kws.contains(&"get".to_string()));
        assert!(kws.contains(&"user".to_string()));
        assert!(kws.contains(&"by".to_string()));
        assert!(kws.contains(&"id".to_string()));
        assert!(kws.contains(&"service".to_string()));
    }

    #[test]
    fn disambiguation_assigns_in_source_order() {
        let mut symbols = vec![
            mk_symbol("a.py::process"),
            mk_symbol("a.py::process"),
            mk_symbol("a.py::other"),
        ];
        disambiguate_ids(&mut symbols);
        assert_eq!(symbols[0].id, "a.py::process~1");
        assert_eq!(symbols[1].id, "a.py::process~2");
        assert_eq!(symbols[2].id, "a.py::other");
    }

    fn mk_symbol(id: &str) -> Symbol {
        Symbol {
            id: id.to_string(),
            file: "a.py".into(),
            name: "process".into(),
            qualified_name: "process".into(),
            kind: "function".into(),
            language: "python".into(),
            signature: "def process():".into(),
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
}
