//! In-memory, read-only view over one repository's symbols. Built fresh from
//! a loaded or freshly-parsed manifest; never mutated in place — a new
//! `CodeIndex` is the only way to reflect a save or incremental save.

use std::collections::HashMap;

use globset::{Glob, GlobSetBuilder};

use crate::scorer::{score, Query};
use crate::symbol::Symbol;

#[derive(Debug, Clone)]
pub struct CodeIndex {
    pub repo: String,
    pub indexed_at: String,
    pub source_files: Vec<String>,
    pub languages: HashMap<String, u32>,
    pub symbols: Vec<Symbol>,
    pub file_hashes: HashMap<String, String>,
    pub git_head: String,
    id_index: HashMap<String, usize>,
}

impl CodeIndex {
    pub fn new(
        repo: String,
        indexed_at: String,
        source_files: Vec<String>,
        languages: HashMap<String, u32>,
        symbols: Vec<Symbol>,
        file_hashes: HashMap<String, String>,
        git_head: String,
    ) -> Self {
        let id_index = symbols.iter().enumerate().map(|(i, s)| (s.id.clone(), i)).collect();
        CodeIndex { repo, indexed_at, source_files, languages, symbols, file_hashes, git_head, id_index }
    }

    /// O(1) lookup by stable symbol id.
    pub fn get(&self, id: &str) -> Option<&Symbol> {
        self.id_index.get(id).map(|&i| &self.symbols[i])
    }

    /// Ranked, filtered search. `file_glob` is matched with shell-glob
    /// semantics against `file`, additionally permitting a match against the
    /// basename by trying `*/pattern` as a fallback.
    pub fn search(&self, query: &str, kind: Option<&str>, file_glob: Option<&str>) -> Vec<&Symbol> {
        let glob_matcher = file_glob.map(build_glob_matcher);
        let q = Query::new(query);

        let mut hits: Vec<(usize, u32, &Symbol)> = self
            .symbols
            .iter()
            .enumerate()
            .filter(|(_, s)| kind.map_or(true, |k| s.kind == k))
            .filter(|(_, s)| glob_matcher.as_ref().map_or(true, |g| g.is_match(&s.file)))
            .filter_map(|(i, s)| {
                let sc = score(s, &q);
                if sc > 0 {
                    Some((i, sc, s))
                } else {
                    None
                }
            })
            .collect();

        // Stable sort descending by score; ties keep insertion (source) order.
        hits.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        hits.into_iter().map(|(_, _, s)| s).collect()
    }

    /// Unique, sorted file paths referenced by `source_files`.
    pub fn files(&self) -> Vec<String> {
        let mut files = self.source_files.clone();
        files.sort();
        files.dedup();
        files
    }
}

/// Shell-glob matcher with the basename fallback: a bare pattern like
/// `"*.py"` also matches `"src/pkg/foo.py"` via a synthesized `*/pattern`.
pub struct GlobMatcher {
    direct: globset::GlobSet,
    basename_fallback: globset::GlobSet,
}

impl GlobMatcher {
    pub fn is_match(&self, file: &str) -> bool {
        self.direct.is_match(file) || self.basename_fallback.is_match(file)
    }
}

pub fn build_glob_matcher(pattern: &str) -> GlobMatcher {
    let mut direct = GlobSetBuilder::new();
    if let Ok(g) = Glob::new(pattern) {
        direct.add(g);
    }
    let mut fallback = GlobSetBuilder::new();
    if let Ok(g) = Glob::new(&format!("*/{pattern}")) {
        fallback.add(g);
    }
    GlobMatcher {
        direct: direct.build().unwrap_or_else(|_| GlobSetBuilder::new().build().unwrap()),
        basename_fallback: fallback.build().unwrap_or_else(|_| GlobSetBuilder::new().build().unwrap()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(id: &str, file: &str, name: &str, kind: &str) -> Symbol {
        Symbol {
            id: id.into(),
            file: file.into(),
            name: name.into(),
            qualified_name: name.into(),
            kind: kind.into(),
            language: "python".into(),
            signature: format!("def {name}():"),
            docstring: String::new(),
            summary: String::new(),
            decorators: vec![],
            keywords: vec![],
            parent: None,
            line: 1,
            end_line: 2,
            byte_offset: 0,
            byte_length: 5,
            content_hash: String::new(),
        }
    }

    fn mk_index(symbols: Vec<Symbol>) -> CodeIndex {
        let files: Vec<String> = symbols.iter().map(|s| s.file.clone()).collect();
        CodeIndex::new(
            "o/n".into(),
            "2024-01-01T00:00:00Z".into(),
            files,
            HashMap::new(),
            symbols,
            HashMap::new(),
            String::new(),
        )
    }

    #[test]
    fn get_by_id() {
        let idx = mk_index(vec![sym("a.py::foo#function", "a.py", "foo", "function")]);
        assert!(idx.get("a.py::foo#function").is_some());
        assert!(idx.get("missing").is_none());
    }

    #[test]
    fn search_filters_by_kind() {
        let idx = mk_index(vec![
            sym("a.py::foo#function", "a.py", "foo", "function"),
            sym("a.py::Foo#class", "a.py", "foo", "class"),
        ]);
        let hits = idx.search("foo", Some("class"), None);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, "class");
    }

    #[test]
    fn search_glob_matches_basename() {
        let idx = mk_index(vec![sym("src/pkg/a.py::foo#function", "src/pkg/a.py", "foo", "function")]);
        let hits = idx.search("foo", None, Some("*.py"));
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn files_are_unique_and_sorted() {
        let idx = mk_index(vec![
            sym("b.py::x#function", "b.py", "x", "function"),
            sym("a.py::y#function", "a.py", "y", "function"),
            sym("a.py::z#function", "a.py", "z", "function"),
        ]);
        assert_eq!(idx.files(), vec!["a.py".to_string(), "b.py".to_string()]);
    }
}
