//! Thin query-tool operations composing `IndexStore`/`CodeIndex` into the
//! public surface a host (or the CLI) calls: outline, search, get-symbol,
//! list-repos, invalidate. Every success payload carries a `_meta` envelope
//! with at least `timing_ms`; failures are `{"error": "..."}` plain values,
//! never a Rust error.

use std::collections::BTreeMap;
use std::time::Instant;

use serde_json::{json, Value};

use crate::index::CodeIndex;
use crate::store::IndexStore;

/// Resolve a repo identifier (`owner/name` or a bare name) against the
/// store's known repos. A bare name must match exactly one `owner/name`
/// suffix; any other outcome is an error.
fn resolve_owner_name(store: &IndexStore, repo: &str) -> Result<(String, String), Value> {
    if let Some((owner, name)) = repo.split_once('/') {
        return Ok((owner.to_string(), name.to_string()));
    }

    let suffix = format!("/{repo}");
    let matches: Vec<_> = store.list_repos().into_iter().filter(|r| r.repo.ends_with(&suffix)).collect();
    match matches.len() {
        0 => Err(json!({ "error": format!("Repository not found: {repo}") })),
        1 => {
            let (owner, name) = matches[0].repo.split_once('/').unwrap();
            Ok((owner.to_string(), name.to_string()))
        }
        _ => Err(json!({ "error": format!("Ambiguous repository name: {repo}") })),
    }
}

fn load_or_error(store: &IndexStore, owner: &str, name: &str) -> Result<CodeIndex, Value> {
    store
        .load_index(owner, name)
        .ok_or_else(|| json!({ "error": format!("Repository not indexed: {owner}/{name}") }))
}

pub fn list_repos(store: &IndexStore) -> Value {
    let start = Instant::now();
    let repos = store.list_repos();
    json!({
        "count": repos.len(),
        "repos": repos,
        "_meta": { "timing_ms": elapsed_ms(start) },
    })
}

pub fn get_repo_outline(store: &IndexStore, repo: &str) -> Value {
    let start = Instant::now();
    let (owner, name) = match resolve_owner_name(store, repo) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let index = match load_or_error(store, &owner, &name) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut directories: BTreeMap<String, u32> = BTreeMap::new();
    for f in &index.source_files {
        let key = match f.split_once('/') {
            Some((top, _)) => format!("{top}/"),
            None => "(root)".to_string(),
        };
        *directories.entry(key).or_insert(0) += 1;
    }

    let mut symbol_kinds: BTreeMap<String, u32> = BTreeMap::new();
    for s in &index.symbols {
        *symbol_kinds.entry(s.kind.clone()).or_insert(0) += 1;
    }

    json!({
        "repo": format!("{owner}/{name}"),
        "indexed_at": index.indexed_at,
        "file_count": index.source_files.len(),
        "symbol_count": index.symbols.len(),
        "languages": index.languages,
        "directories": directories,
        "symbol_kinds": symbol_kinds,
        "_meta": { "timing_ms": elapsed_ms(start) },
    })
}

pub fn get_file_tree(store: &IndexStore, repo: &str, prefix: Option<&str>) -> Value {
    let start = Instant::now();
    let (owner, name) = match resolve_owner_name(store, repo) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let index = match load_or_error(store, &owner, &name) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut matched: Vec<String> = index.files();
    if let Some(p) = prefix {
        matched.retain(|f| f.starts_with(p));
    }

    json!({
        "repo": format!("{owner}/{name}"),
        "files": matched,
        "_meta": { "timing_ms": elapsed_ms(start) },
    })
}

pub fn get_file_outline(store: &IndexStore, repo: &str, file_path: &str) -> Value {
    let start = Instant::now();
    let (owner, name) = match resolve_owner_name(store, repo) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let index = match load_or_error(store, &owner, &name) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let symbols: Vec<Value> = index
        .symbols
        .iter()
        .filter(|s| s.file == file_path)
        .map(|s| {
            json!({
                "id": s.id,
                "kind": s.kind,
                "name": s.name,
                "qualified_name": s.qualified_name,
                "line": s.line,
                "end_line": s.end_line,
                "signature": s.signature,
                "summary": s.summary,
            })
        })
        .collect();

    json!({
        "repo": format!("{owner}/{name}"),
        "file": file_path,
        "symbol_count": symbols.len(),
        "symbols": symbols,
        "_meta": { "timing_ms": elapsed_ms(start) },
    })
}

pub fn get_symbol(store: &IndexStore, repo: &str, id: &str, verify: bool, context_lines: usize) -> Value {
    let start = Instant::now();
    let (owner, name) = match resolve_owner_name(store, repo) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let index = match load_or_error(store, &owner, &name) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let Some(symbol) = index.get(id) else {
        return json!({ "error": format!("Symbol not found: {id}") });
    };

    let Some(source) = store.get_symbol_content(&owner, &name, id) else {
        return json!({ "error": format!("Symbol content unavailable: {id}") });
    };

    let hash_match = if verify {
        Some(crate::symbol::compute_content_hash(source.as_bytes()) == symbol.content_hash)
    } else {
        None
    };

    let context = if context_lines > 0 {
        read_context(store, &owner, &name, &symbol.file, symbol.line, symbol.end_line, context_lines)
    } else {
        None
    };

    let mut payload = json!({
        "id": symbol.id,
        "file": symbol.file,
        "name": symbol.name,
        "qualified_name": symbol.qualified_name,
        "kind": symbol.kind,
        "language": symbol.language,
        "signature": symbol.signature,
        "docstring": symbol.docstring,
        "summary": symbol.summary,
        "decorators": symbol.decorators,
        "parent": symbol.parent,
        "line": symbol.line,
        "end_line": symbol.end_line,
        "source": source,
        "_meta": { "timing_ms": elapsed_ms(start) },
    });

    if let Some(matched) = hash_match {
        payload["hash_verified"] = json!(matched);
    }
    if let Some(ctx) = context {
        payload["context"] = json!(ctx);
    }
    payload
}

pub fn get_symbols(store: &IndexStore, repo: &str, ids: &[String]) -> Value {
    let start = Instant::now();
    let (owner, name) = match resolve_owner_name(store, repo) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let index = match load_or_error(store, &owner, &name) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut successes = Vec::new();
    let mut errors = BTreeMap::new();
    for id in ids {
        match index.get(id) {
            Some(symbol) => match store.get_symbol_content(&owner, &name, id) {
                Some(source) => successes.push(json!({
                    "id": symbol.id,
                    "name": symbol.name,
                    "kind": symbol.kind,
                    "file": symbol.file,
                    "signature": symbol.signature,
                    "source": source,
                })),
                None => {
                    errors.insert(id.clone(), "Symbol content unavailable".to_string());
                }
            },
            None => {
                errors.insert(id.clone(), "Symbol not found".to_string());
            }
        }
    }

    json!({
        "repo": format!("{owner}/{name}"),
        "results": successes,
        "errors": errors,
        "_meta": { "timing_ms": elapsed_ms(start) },
    })
}

#[allow(clippy::too_many_arguments)]
pub fn search_symbols(
    store: &IndexStore,
    repo: &str,
    query: &str,
    kind: Option<&str>,
    file_pattern: Option<&str>,
    language: Option<&str>,
    max_results: usize,
) -> Value {
    let start = Instant::now();
    let (owner, name) = match resolve_owner_name(store, repo) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let index = match load_or_error(store, &owner, &name) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut hits = index.search(query, kind, file_pattern);
    if let Some(lang) = language {
        hits.retain(|s| s.language == lang);
    }

    let total_hits = hits.len();
    let q = crate::scorer::Query::new(query);
    let results: Vec<Value> = hits
        .iter()
        .take(max_results)
        .map(|s| {
            json!({
                "id": s.id,
                "kind": s.kind,
                "name": s.name,
                "file": s.file,
                "line": s.line,
                "signature": s.signature,
                "summary": s.summary,
                "score": crate::scorer::score(s, &q),
            })
        })
        .collect();

    json!({
        "repo": format!("{owner}/{name}"),
        "query": query,
        "result_count": results.len(),
        "results": results,
        "_meta": {
            "timing_ms": elapsed_ms(start),
            "total_symbols": index.symbols.len(),
            "truncated": total_hits > max_results,
        },
    })
}

pub fn search_text(store: &IndexStore, repo: &str, query: &str, file_pattern: Option<&str>, max_results: usize) -> Value {
    let start = Instant::now();
    let (owner, name) = match resolve_owner_name(store, repo) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let index = match load_or_error(store, &owner, &name) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let glob = file_pattern.map(crate::index::build_glob_matcher);
    let needle = query.to_lowercase();

    let mut files: Vec<String> = index.source_files.clone();
    files.sort();

    let mut matches = Vec::new();
    let mut truncated = false;
    'files: for file in &files {
        if let Some(g) = &glob {
            if !g.is_match(file) {
                continue;
            }
        }
        let Some(contents) = read_mirror_file(store, &owner, &name, file) else { continue };
        for (line_no, line) in contents.lines().enumerate() {
            if line.to_lowercase().contains(&needle) {
                matches.push(json!({
                    "file": file,
                    "line": line_no + 1,
                    "text": line.trim(),
                }));
                if matches.len() >= max_results {
                    truncated = true;
                    break 'files;
                }
            }
        }
    }

    json!({
        "repo": format!("{owner}/{name}"),
        "query": query,
        "result_count": matches.len(),
        "results": matches,
        "_meta": { "timing_ms": elapsed_ms(start), "truncated": truncated },
    })
}

pub fn invalidate_cache(store: &IndexStore, repo: &str) -> Value {
    let (owner, name) = match resolve_owner_name(store, repo) {
        Ok(v) => v,
        Err(e) => return e,
    };
    if store.delete_index(&owner, &name) {
        json!({
            "success": true,
            "repo": format!("{owner}/{name}"),
            "message": format!("Index and cached files deleted for {owner}/{name}"),
        })
    } else {
        json!({ "success": false, "error": format!("No index found for {owner}/{name}") })
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    (start.elapsed().as_secs_f64() * 1000.0 * 10.0).round() / 10.0
}

fn read_mirror_file(store: &IndexStore, owner: &str, name: &str, file: &str) -> Option<String> {
    let path = store.mirror_path(owner, name, file);
    std::fs::read(&path).ok().map(|b| String::from_utf8_lossy(&b).into_owned())
}

fn read_context(
    store: &IndexStore,
    owner: &str,
    name: &str,
    file: &str,
    line: u32,
    end_line: u32,
    context_lines: usize,
) -> Option<Vec<String>> {
    let contents = read_mirror_file(store, owner, name, file)?;
    let all_lines: Vec<&str> = contents.lines().collect();
    let start = (line as usize).saturating_sub(1).saturating_sub(context_lines);
    let stop = ((end_line as usize) + context_lines).min(all_lines.len());
    Some(all_lines[start..stop].iter().map(|s| s.to_string()).collect())
}
