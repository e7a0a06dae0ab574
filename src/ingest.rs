//! The ingest pipeline: discovery → parser adapter → summarizer → index
//! store. Ties together every other module into the two operations the CLI's
//! `index` subcommand drives: a full (re)index and an incremental reindex.
//!
//! Parsing runs one file at a time but files are independent — [`parser::parse_file`]
//! is pure and stateless, so the fan-out across files uses `rayon`, mirroring
//! the teacher's `ast.rs` use of `rayon::prelude` for its own AST pass.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::discovery::{self, DiscoveredFile, DEFAULT_MAX_FILES, DEFAULT_MAX_FILE_SIZE};
use crate::parser::{self, language_for_path};
use crate::store::IndexStore;
use crate::summary::Summarizer;
use crate::symbol::Symbol;

/// Parse every discovered file in parallel and summarize each resulting
/// symbol. Files with no recognized language yield no symbols (discovery
/// already filters those out, but this stays defensive for direct callers).
fn parse_all(files: &[DiscoveredFile], summarizer: &dyn Summarizer) -> Vec<Symbol> {
    files
        .par_iter()
        .flat_map(|f| {
            let Some(lang) = language_for_path(&f.path) else {
                return Vec::new();
            };
            let source = String::from_utf8_lossy(&f.bytes);
            let mut symbols = parser::parse_file(&source, &f.path, lang);
            for s in &mut symbols {
                s.summary = summarizer.summarize(s);
            }
            symbols
        })
        .collect()
}

/// Full or incremental ingest of `root` into `{owner}/{name}`, deciding which
/// based on whether a prior manifest exists. Always discovers the *entire*
/// current tree first — change detection needs the full current file set to
/// compute `new`/`changed`/`deleted`, not just the files that happened to
/// change on disk.
pub fn ingest_repo(
    store: &IndexStore,
    owner: &str,
    name: &str,
    root: &Path,
    summarizer: &dyn Summarizer,
) -> Value {
    ingest_repo_with_limits(store, owner, name, root, summarizer, DEFAULT_MAX_FILES, DEFAULT_MAX_FILE_SIZE)
}

pub fn ingest_repo_with_limits(
    store: &IndexStore,
    owner: &str,
    name: &str,
    root: &Path,
    summarizer: &dyn Summarizer,
    max_files: usize,
    max_size: u64,
) -> Value {
    let start = Instant::now();
    let discovered = discovery::discover(root, max_files, max_size);
    debug!(repo = format!("{owner}/{name}"), files = discovered.files.len(), "discovery complete");

    let current_files: HashMap<String, Vec<u8>> =
        discovered.files.iter().map(|f| (f.path.clone(), f.bytes.clone())).collect();
    let languages = discovery::language_counts(&discovered.files);
    let git_head = crate::git::head_with_timeout(root);

    let prior_exists = store.load_index(owner, name).is_some();
    let changes = store.detect_changes(owner, name, &current_files);

    let warnings: Vec<Value> = discovered
        .warnings
        .iter()
        .map(|w| json!({ "file": w.file, "reason": w.reason }))
        .collect();

    let (kind, to_parse, write_result) = if !prior_exists {
        let symbols = parse_all(&discovered.files, summarizer);
        let source_files: Vec<String> = discovered.files.iter().map(|f| f.path.clone()).collect();
        let result = store.save(owner, name, source_files, symbols, &current_files, languages, git_head);
        ("full", discovered.files.len(), result)
    } else {
        let touched: std::collections::HashSet<&str> =
            changes.changed.iter().chain(changes.new.iter()).map(|s| s.as_str()).collect();
        let touched_files: Vec<&DiscoveredFile> =
            discovered.files.iter().filter(|f| touched.contains(f.path.as_str())).collect();
        let touched_owned: Vec<DiscoveredFile> = touched_files
            .into_iter()
            .map(|f| DiscoveredFile { path: f.path.clone(), bytes: f.bytes.clone() })
            .collect();
        let symbols = parse_all(&touched_owned, summarizer);
        let raw_files: HashMap<String, Vec<u8>> =
            touched_owned.iter().map(|f| (f.path.clone(), f.bytes.clone())).collect();
        let result = store
            .incremental_save(owner, name, &changes, symbols, &raw_files, languages, git_head)
            .map(|opt| opt.unwrap_or(()));
        ("incremental", touched_owned.len(), result)
    };

    if let Err(e) = write_result {
        return json!({ "error": format!("failed to write index: {e}") });
    }

    let index = store.load_index(owner, name);
    let symbol_count = index.as_ref().map(|i| i.symbols.len()).unwrap_or(0);
    info!(
        repo = format!("{owner}/{name}"),
        kind,
        parsed = to_parse,
        symbols = symbol_count,
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "ingest complete"
    );

    json!({
        "repo": format!("{owner}/{name}"),
        "mode": kind,
        "file_count": index.as_ref().map(|i| i.source_files.len()).unwrap_or(0),
        "symbol_count": symbol_count,
        "changed": changes.changed,
        "new": changes.new,
        "deleted": changes.deleted,
        "warnings": warnings,
        "_meta": {
            "timing_ms": (start.elapsed().as_secs_f64() * 1000.0 * 10.0).round() / 10.0,
            "truncated": discovered.truncated,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::FallbackSummarizer;
    use std::fs;

    fn store() -> (tempfile::TempDir, IndexStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path().join("index"));
        (dir, store)
    }

    #[test]
    fn first_ingest_is_full_and_parses_every_file() {
        let (src_dir, store) = store();
        fs::write(src_dir.path().join("a.py"), b"def hello():\n    pass\n").unwrap();

        let result = ingest_repo(&store, "acme", "widgets", src_dir.path(), &FallbackSummarizer);
        assert_eq!(result["mode"], "full");
        assert_eq!(result["file_count"], 1);
        assert_eq!(result["symbol_count"], 1);
        assert_eq!(result["new"], json!(["a.py"]));
    }

    #[test]
    fn second_ingest_is_incremental_and_reparses_only_changed() {
        let (src_dir, store) = store();
        fs::write(src_dir.path().join("a.py"), b"def hello():\n    pass\n").unwrap();
        fs::write(src_dir.path().join("b.py"), b"def other():\n    pass\n").unwrap();
        ingest_repo(&store, "acme", "widgets", src_dir.path(), &FallbackSummarizer);

        fs::write(src_dir.path().join("a.py"), b"def hello():\n    return 1\n").unwrap();
        let result = ingest_repo(&store, "acme", "widgets", src_dir.path(), &FallbackSummarizer);
        assert_eq!(result["mode"], "incremental");
        assert_eq!(result["changed"], json!(["a.py"]));
        assert_eq!(result["file_count"], 2);
        assert_eq!(result["symbol_count"], 2);
    }

    #[test]
    fn deleted_file_drops_its_symbols() {
        let (src_dir, store) = store();
        fs::write(src_dir.path().join("a.py"), b"def hello():\n    pass\n").unwrap();
        fs::write(src_dir.path().join("b.py"), b"def other():\n    pass\n").unwrap();
        ingest_repo(&store, "acme", "widgets", src_dir.path(), &FallbackSummarizer);

        fs::remove_file(src_dir.path().join("b.py")).unwrap();
        let result = ingest_repo(&store, "acme", "widgets", src_dir.path(), &FallbackSummarizer);
        assert_eq!(result["deleted"], json!(["b.py"]));
        assert_eq!(result["file_count"], 1);
        let index = store.load_index("acme", "widgets").unwrap();
        assert!(!index.symbols.iter().any(|s| s.file == "b.py"));
    }
}
