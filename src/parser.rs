//! Per-language tree-sitter walk producing [`Symbol`] records.
//!
//! Mirrors the teacher's `classify_node` / `extract_name` / `extract_signature`
//! / `walk_node` shape, generalized to also compute qualified names, parent
//! links, docstrings, decorators, keywords, byte offsets and content hashes —
//! none of which the teacher's lighter-weight outline walker needed.

use std::path::Path;
use tree_sitter::{Node, Parser};

use crate::symbol::{compute_content_hash, extract_keywords, make_symbol_id, Language, Symbol};

/// Resolve a file's language from its extension, using the same mapping as
/// [`Language::from_extension`] kept in one place.
pub fn language_for_path(path: &str) -> Option<Language> {
    let ext = Path::new(path).extension()?.to_str()?;
    Language::from_extension(ext)
}

fn grammar_for(language: Language) -> Option<tree_sitter::Language> {
    match language {
        Language::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
        Language::Typescript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        Language::Javascript => Some(tree_sitter_javascript::LANGUAGE.into()),
        Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
        Language::Go => Some(tree_sitter_go::LANGUAGE.into()),
        Language::Java => Some(tree_sitter_java::LANGUAGE.into()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawKind {
    Function,
    Class,
    Method,
    Constant,
    Type,
}

impl RawKind {
    fn as_str(self) -> &'static str {
        match self {
            RawKind::Function => "function",
            RawKind::Class => "class",
            RawKind::Method => "method",
            RawKind::Constant => "constant",
            RawKind::Type => "type",
        }
    }
}

/// A symbol in the middle of construction: everything but the final,
/// post-disambiguation `id`/`parent`, which are resolved in one pass over
/// the whole file after the walk completes.
struct Pending {
    symbol: Symbol,
    parent_idx: Option<usize>,
    /// Set for Rust methods whose enclosing `impl` block has no symbol node
    /// of its own; resolved by name against the file's type/class symbols
    /// once the whole file has been walked.
    impl_parent_name: Option<String>,
}

/// Node kinds that introduce a named container whose name should be
/// prepended onto descendants' `qualified_name`.
fn container_name(language: Language, node: &Node, source: &[u8]) -> Option<String> {
    let kind = node.kind();
    let is_container = matches!(
        (language, kind),
        (Language::Python, "class_definition")
            | (Language::Javascript, "class_declaration")
            | (Language::Typescript, "class_declaration")
            | (Language::Typescript, "interface_declaration")
            | (Language::Rust, "impl_item")
            | (Language::Rust, "trait_item")
            | (Language::Java, "class_declaration")
            | (Language::Java, "interface_declaration")
            | (Language::Java, "enum_declaration")
            | (Language::Java, "record_declaration")
    );
    if !is_container {
        return None;
    }
    if language == Language::Rust && kind == "impl_item" {
        return node
            .child_by_field_name("type")
            .and_then(|n| n.utf8_text(source).ok())
            .map(|s| s.trim().to_string());
    }
    node.child_by_field_name("name").and_then(|n| n.utf8_text(source).ok()).map(|s| s.trim().to_string())
}

fn is_upper_ident(name: &str) -> bool {
    let has_letter = name.chars().any(|c| c.is_alphabetic());
    has_letter && !name.chars().any(|c| c.is_lowercase())
}

fn classify(language: Language, node: &Node, source: &[u8], in_container: bool, top_level: bool) -> Option<RawKind> {
    let kind = node.kind();
    match (language, kind) {
        (Language::Python, "function_definition") => {
            Some(if in_container { RawKind::Method } else { RawKind::Function })
        }
        (Language::Python, "class_definition") => Some(RawKind::Class),
        (Language::Python, "assignment") => {
            if !top_level {
                return None;
            }
            let left = node.child_by_field_name("left")?;
            if left.kind() != "identifier" {
                return None;
            }
            let name = left.utf8_text(source).ok()?;
            if is_upper_ident(name) {
                Some(RawKind::Constant)
            } else {
                None
            }
        }

        (Language::Javascript, "function_declaration")
        | (Language::Typescript, "function_declaration") => Some(RawKind::Function),
        (Language::Javascript, "class_declaration") | (Language::Typescript, "class_declaration") => {
            Some(RawKind::Class)
        }
        (Language::Javascript, "method_definition") | (Language::Typescript, "method_definition") => {
            Some(RawKind::Method)
        }
        (Language::Typescript, "method_signature") => Some(RawKind::Method),
        (Language::Typescript, "interface_declaration") => Some(RawKind::Type),
        (Language::Typescript, "type_alias_declaration") => Some(RawKind::Type),
        (Language::Javascript, "variable_declarator") | (Language::Typescript, "variable_declarator") => {
            if !top_level {
                return None;
            }
            let name = node.child_by_field_name("name")?.utf8_text(source).ok()?;
            let value_kind = node.child_by_field_name("value").map(|v| v.kind()).unwrap_or("");
            if matches!(value_kind, "arrow_function" | "function" | "function_expression") {
                Some(RawKind::Function)
            } else if is_upper_ident(name) {
                Some(RawKind::Constant)
            } else {
                None
            }
        }

        (Language::Go, "function_declaration") => Some(RawKind::Function),
        (Language::Go, "method_declaration") => Some(RawKind::Function),
        (Language::Go, "type_spec") => Some(RawKind::Type),
        (Language::Go, "const_spec") => {
            let name = node.child_by_field_name("name").or_else(|| node.named_child(0))?.utf8_text(source).ok()?;
            if is_upper_ident(name) {
                Some(RawKind::Constant)
            } else {
                None
            }
        }

        (Language::Rust, "function_item") => {
            Some(if in_container { RawKind::Method } else { RawKind::Function })
        }
        (Language::Rust, "struct_item")
        | (Language::Rust, "enum_item")
        | (Language::Rust, "trait_item")
        | (Language::Rust, "type_item") => Some(RawKind::Type),
        (Language::Rust, "const_item") => Some(RawKind::Constant),

        (Language::Java, "class_declaration") | (Language::Java, "record_declaration") => Some(RawKind::Class),
        (Language::Java, "interface_declaration") | (Language::Java, "enum_declaration") => Some(RawKind::Type),
        (Language::Java, "method_declaration") | (Language::Java, "constructor_declaration") => {
            Some(RawKind::Method)
        }
        (Language::Java, "field_declaration") => {
            let modifiers_text = node
                .child_by_field_name("modifiers")
                .or_else(|| node.named_child(0).filter(|c| c.kind() == "modifiers"))
                .and_then(|m| m.utf8_text(source).ok())
                .unwrap_or("");
            if modifiers_text.contains("static") && modifiers_text.contains("final") {
                Some(RawKind::Constant)
            } else {
                None
            }
        }

        _ => None,
    }
}

/// Extract the declared name of a classified symbol node.
fn extract_name(language: Language, node: &Node, source: &[u8]) -> Option<String> {
    match (language, node.kind()) {
        (Language::Go, "type_spec") => node.named_child(0).and_then(|n| n.utf8_text(source).ok()),
        (Language::Go, "const_spec") => node
            .child_by_field_name("name")
            .or_else(|| node.named_child(0))
            .and_then(|n| n.utf8_text(source).ok()),
        (Language::Java, "field_declaration") => node
            .child_by_field_name("declarator")
            .and_then(|d| d.child_by_field_name("name"))
            .and_then(|n| n.utf8_text(source).ok()),
        (_, "variable_declarator") => node.child_by_field_name("name").and_then(|n| n.utf8_text(source).ok()),
        (Language::Python, "assignment") => node.child_by_field_name("left").and_then(|n| n.utf8_text(source).ok()),
        _ => node.child_by_field_name("name").and_then(|n| n.utf8_text(source).ok()),
    }
    .map(|s| s.trim().to_string())
    .filter(|s| !s.is_empty())
}

/// First line of the node's source, with the body opener stripped.
fn extract_signature(language: Language, node: &Node, source: &[u8]) -> String {
    let text = node.utf8_text(source).unwrap_or("");
    let first_line = text.lines().next().unwrap_or("").trim();

    let sig = if language == Language::Python {
        first_line.find(':').map(|i| &first_line[..=i]).unwrap_or(first_line)
    } else if let Some(brace) = first_line.find('{') {
        first_line[..brace].trim()
    } else {
        first_line
    };

    let mut sig = sig.to_string();
    if sig.len() > 200 {
        let cut = floor_char_boundary(&sig, 200);
        sig.truncate(cut);
        sig.push_str("...");
    }
    sig
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Contiguous comment/decorator siblings immediately above `node`, closest
/// first in source text but returned in source order.
fn preceding_contiguous<'a>(node: &Node<'a>, predicate: impl Fn(&Node) -> bool) -> Vec<Node<'a>> {
    let mut out = Vec::new();
    let mut cur = *node;
    loop {
        let prev = match cur.prev_sibling() {
            Some(p) => p,
            None => break,
        };
        if !predicate(&prev) {
            break;
        }
        if prev.end_position().row + 1 < cur.start_position().row {
            // blank line between comment/decorator and the node: not attached
            break;
        }
        out.push(prev);
        cur = prev;
    }
    out.reverse();
    out
}

fn extract_decorators(language: Language, node: &Node, source: &[u8]) -> Vec<String> {
    let is_decorator = |n: &Node| -> bool {
        matches!(
            (language, n.kind()),
            (Language::Python, "decorator")
                | (Language::Typescript, "decorator")
                | (Language::Java, "annotation")
                | (Language::Java, "marker_annotation")
                | (Language::Rust, "attribute_item")
        )
    };
    preceding_contiguous(node, is_decorator)
        .iter()
        .filter_map(|n| n.utf8_text(source).ok())
        .map(|s| s.trim().to_string())
        .collect()
}

fn extract_docstring(language: Language, node: &Node, source: &[u8]) -> String {
    match language {
        Language::Python => {
            let body = match node.child_by_field_name("body") {
                Some(b) => b,
                None => return String::new(),
            };
            let first = match body.named_child(0) {
                Some(f) => f,
                None => return String::new(),
            };
            if first.kind() != "expression_statement" {
                return String::new();
            }
            let inner = match first.named_child(0) {
                Some(i) => i,
                None => return String::new(),
            };
            if inner.kind() != "string" {
                return String::new();
            }
            inner
                .utf8_text(source)
                .unwrap_or("")
                .trim()
                .trim_matches(|c| c == '"' || c == '\'')
                .trim()
                .to_string()
        }
        Language::Rust => {
            let comments = preceding_contiguous(node, |n| n.kind() == "line_comment");
            let lines: Vec<&str> = comments
                .iter()
                .filter_map(|n| n.utf8_text(source).ok())
                .filter(|t| t.starts_with("///"))
                .map(|t| t.trim_start_matches("///").trim())
                .collect();
            lines.join("\n")
        }
        Language::Go => {
            let comments = preceding_contiguous(node, |n| n.kind() == "comment");
            let lines: Vec<&str> = comments
                .iter()
                .filter_map(|n| n.utf8_text(source).ok())
                .map(|t| t.trim_start_matches("//").trim())
                .collect();
            lines.join("\n")
        }
        Language::Javascript | Language::Typescript | Language::Java => {
            let comments = preceding_contiguous(node, |n| n.kind() == "comment");
            comments
                .last()
                .and_then(|n| n.utf8_text(source).ok())
                .filter(|t| t.starts_with("/**"))
                .map(|t| {
                    t.trim_start_matches("/**")
                        .trim_end_matches("*/")
                        .lines()
                        .map(|l| l.trim().trim_start_matches('*').trim())
                        .collect::<Vec<_>>()
                        .join("\n")
                        .trim()
                        .to_string()
                })
                .unwrap_or_default()
        }
    }
}

struct Walker<'a> {
    language: Language,
    file: &'a str,
    source: &'a [u8],
    out: Vec<Pending>,
}

impl<'a> Walker<'a> {
    fn walk(
        &mut self,
        node: Node<'a>,
        qualifiers: &[String],
        in_container: bool,
        parent_idx: Option<usize>,
        impl_parent_name: Option<&str>,
    ) {
        let kind = node.kind();

        // Transparent wrappers: descend without changing container/parent state.
        if matches!(kind, "export_statement" | "decorated_definition" | "type_declaration" | "lexical_declaration"
            | "variable_declaration" | "const_declaration")
        {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                self.walk(child, qualifiers, in_container, parent_idx, impl_parent_name);
            }
            return;
        }

        if let Some(container) = container_name(self.language, &node, self.source) {
            // Rust `impl` blocks are not symbols in their own right — they
            // only establish the qualifier/parent scope for their methods.
            // The struct/enum/trait they target is a *sibling* node, so we
            // resolve the parent link by name after the whole file is walked.
            let is_bare_impl = self.language == Language::Rust && kind == "impl_item";
            let (next_parent_for_children, next_impl_parent_name) = if is_bare_impl {
                (parent_idx, Some(container.clone()))
            } else {
                let raw_kind = classify(self.language, &node, self.source, in_container, parent_idx.is_none())
                    .unwrap_or(RawKind::Class);
                let idx = self.emit(&node, &container, raw_kind, qualifiers, parent_idx, None);
                (Some(idx), None)
            };
            let mut nested = qualifiers.to_vec();
            nested.push(container);
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                self.walk(child, &nested, true, next_parent_for_children, next_impl_parent_name.as_deref());
            }
            return;
        }

        if let Some(raw_kind) = classify(self.language, &node, self.source, in_container, parent_idx.is_none()) {
            if let Some(name) = extract_name(self.language, &node, self.source) {
                let my_idx = self.emit(&node, &name, raw_kind, qualifiers, parent_idx, impl_parent_name);
                let next_parent = if matches!(raw_kind, RawKind::Function | RawKind::Method) {
                    Some(my_idx)
                } else {
                    parent_idx
                };
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    self.walk(child, qualifiers, in_container, next_parent, None);
                }
                return;
            }
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child, qualifiers, in_container, parent_idx, impl_parent_name);
        }
    }

    fn emit(
        &mut self,
        node: &Node<'a>,
        name: &str,
        raw_kind: RawKind,
        qualifiers: &[String],
        parent_idx: Option<usize>,
        impl_parent_name: Option<&str>,
    ) -> usize {
        let qualified_name = if qualifiers.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", qualifiers.join("."), name)
        };
        let kind_str = raw_kind.as_str();
        let raw_id = make_symbol_id(self.file, &qualified_name, kind_str);
        let byte_offset = node.start_byte();
        let byte_length = node.end_byte() - byte_offset;
        let content_hash = compute_content_hash(&self.source[byte_offset..node.end_byte()]);

        let symbol = Symbol {
            id: raw_id,
            file: self.file.to_string(),
            name: name.to_string(),
            qualified_name: qualified_name.clone(),
            kind: kind_str.to_string(),
            language: self.language.as_str().to_string(),
            signature: extract_signature(self.language, node, self.source),
            docstring: extract_docstring(self.language, node, self.source),
            summary: String::new(),
            decorators: extract_decorators(self.language, node, self.source),
            keywords: extract_keywords(name, &qualified_name),
            parent: None,
            line: (node.start_position().row + 1) as u32,
            end_line: (node.end_position().row + 1) as u32,
            byte_offset,
            byte_length,
            content_hash,
        };

        let idx = self.out.len();
        let impl_parent_name = if parent_idx.is_none() {
            impl_parent_name.map(|s| s.to_string())
        } else {
            None
        };
        self.out.push(Pending { symbol, parent_idx, impl_parent_name });
        idx
    }
}

/// Parse one file's source into symbols. Never panics: a missing grammar or
/// a total parse failure yields an empty, non-fatal result.
pub fn parse_file(source: &str, file: &str, language: Language) -> Vec<Symbol> {
    let grammar = match grammar_for(language) {
        Some(g) => g,
        None => return Vec::new(),
    };

    let mut parser = Parser::new();
    if parser.set_language(&grammar).is_err() {
        return Vec::new();
    }

    let tree = match parser.parse(source, None) {
        Some(t) => t,
        None => return Vec::new(),
    };

    let mut walker = Walker { language, file, source: source.as_bytes(), out: Vec::new() };
    let root = tree.root_node();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        walker.walk(child, &[], false, None, None);
    }

    finalize(walker.out)
}

/// Apply `~1`, `~2`, … suffixes to colliding ids in source order, then wire
/// up `parent` using the *final* (post-suffix) ids — see SPEC_FULL.md §9.
fn finalize(pending: Vec<Pending>) -> Vec<Symbol> {
    use std::collections::HashMap;

    let mut counts: HashMap<String, usize> = HashMap::new();
    for p in &pending {
        *counts.entry(p.symbol.id.clone()).or_insert(0) += 1;
    }

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut final_ids = Vec::with_capacity(pending.len());
    for p in &pending {
        let total = *counts.get(&p.symbol.id).unwrap_or(&1);
        let final_id = if total > 1 {
            let n = seen.entry(p.symbol.id.clone()).or_insert(0);
            *n += 1;
            format!("{}~{}", p.symbol.id, n)
        } else {
            p.symbol.id.clone()
        };
        final_ids.push(final_id);
    }

    let parent_idxs: Vec<Option<usize>> = pending.iter().map(|p| p.parent_idx).collect();
    let impl_parent_names: Vec<Option<String>> = pending.iter().map(|p| p.impl_parent_name.clone()).collect();
    let mut symbols: Vec<Symbol> = pending.into_iter().map(|p| p.symbol).collect();
    for (i, id) in final_ids.iter().enumerate() {
        symbols[i].id = id.clone();
    }

    // Name -> final id, for resolving Rust impl-block parents (the impl
    // target and its methods are siblings, not ancestor/descendant nodes).
    let mut by_name: HashMap<&str, &str> = HashMap::new();
    for s in &symbols {
        if matches!(s.kind.as_str(), "type" | "class") {
            by_name.insert(s.name.as_str(), s.id.as_str());
        }
    }
    let resolved_impl_parents: Vec<Option<String>> =
        impl_parent_names.iter().map(|n| n.as_deref().and_then(|n| by_name.get(n)).map(|s| s.to_string())).collect();

    for (i, parent_idx) in parent_idxs.iter().enumerate() {
        if let Some(p) = parent_idx {
            symbols[i].parent = Some(final_ids[*p].clone());
        } else if let Some(resolved) = &resolved_impl_parents[i] {
            symbols[i].parent = Some(resolved.clone());
        }
    }
    symbols
}
