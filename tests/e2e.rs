//! End-to-end pipeline tests: discovery → parse → ingest → query, exercised
//! together the way the CLI drives them, rather than module-by-module.
//!
//! Grounded on the teacher's `tests/helpers` fixture-harness pattern
//! (`server/tests/helpers/mod.rs`): copy a fixture into an isolated temp
//! root, point a fresh store at another temp root, and drive the library
//! through its public surface exactly as a host would.

use std::fs;
use std::path::Path;

use codetrace::ingest::ingest_repo;
use codetrace::query;
use codetrace::store::IndexStore;
use codetrace::summary::FallbackSummarizer;

struct Harness {
    _src: tempfile::TempDir,
    _base: tempfile::TempDir,
    store: IndexStore,
}

impl Harness {
    fn with_fixture(name: &str) -> Self {
        let fixture_src =
            Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name);
        let src = tempfile::tempdir().unwrap();
        copy_dir_recursive(&fixture_src, src.path());

        let base = tempfile::tempdir().unwrap();
        let store = IndexStore::new(base.path().to_path_buf());
        Harness { _src: src, _base: base, store }
    }

    fn root(&self) -> &Path {
        self._src.path()
    }

    fn ingest(&self) -> serde_json::Value {
        ingest_repo(&self.store, "acme", "sample", self.root(), &FallbackSummarizer)
    }
}

fn copy_dir_recursive(from: &Path, to: &Path) {
    fs::create_dir_all(to).unwrap();
    for entry in fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let dest = to.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_dir_recursive(&entry.path(), &dest);
        } else {
            fs::copy(entry.path(), dest).unwrap();
        }
    }
}

#[test]
fn python_sample_ingests_five_symbols_and_ranks_delete_first() {
    let h = Harness::with_fixture("python_sample");
    let ingest_result = h.ingest();
    assert_eq!(ingest_result["mode"], "full");
    assert_eq!(ingest_result["symbol_count"], 5);
    assert!(ingest_result["warnings"].as_array().unwrap().is_empty());

    let outline = query::get_repo_outline(&h.store, "acme/sample");
    assert_eq!(outline["symbol_count"], 5);
    assert_eq!(outline["languages"]["python"], 1);

    let file_outline = query::get_file_outline(&h.store, "acme/sample", "sample.py");
    let names: Vec<&str> =
        file_outline["symbols"].as_array().unwrap().iter().map(|s| s["name"].as_str().unwrap()).collect();
    assert!(names.contains(&"MAX_RETRIES"));
    assert!(names.contains(&"UserService"));
    assert!(names.contains(&"get_user"));
    assert!(names.contains(&"delete_user"));
    assert!(names.contains(&"authenticate"));

    let search = query::search_symbols(&h.store, "acme/sample", "delete", None, None, None, 10);
    let results = search["results"].as_array().unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0]["name"], "delete_user");
    assert!(results[0]["score"].as_u64().unwrap() >= 10);
}

#[test]
fn bare_repo_name_resolves_uniquely() {
    let h = Harness::with_fixture("python_sample");
    h.ingest();
    let outline = query::get_repo_outline(&h.store, "sample");
    assert_eq!(outline["repo"], "acme/sample");
}

#[test]
fn get_symbol_is_byte_exact_and_hash_verifies() {
    let h = Harness::with_fixture("python_sample");
    h.ingest();

    let outline = query::get_file_outline(&h.store, "acme/sample", "sample.py");
    let delete_user =
        outline["symbols"].as_array().unwrap().iter().find(|s| s["name"] == "delete_user").unwrap();
    let id = delete_user["id"].as_str().unwrap();

    let symbol = query::get_symbol(&h.store, "acme/sample", id, true, 0);
    assert_eq!(symbol["hash_verified"], true);
    assert!(symbol["source"].as_str().unwrap().contains("def delete_user"));
}

#[test]
fn incremental_reingest_reparses_only_the_changed_file() {
    let h = Harness::with_fixture("python_sample");
    h.ingest();

    fs::write(
        h.root().join("sample.py"),
        "MAX_RETRIES = 3\n\ndef authenticate(user):\n    return user is not None\n",
    )
    .unwrap();
    let result = h.ingest();
    assert_eq!(result["mode"], "incremental");
    assert_eq!(result["changed"], serde_json::json!(["sample.py"]));

    let outline = query::get_repo_outline(&h.store, "acme/sample");
    assert_eq!(outline["symbol_count"], 2);
}

#[test]
fn deleting_a_file_and_reingesting_removes_its_symbols() {
    let h = Harness::with_fixture("python_sample");
    h.ingest();

    fs::remove_file(h.root().join("sample.py")).unwrap();
    let result = h.ingest();
    assert_eq!(result["deleted"], serde_json::json!(["sample.py"]));

    let outline = query::get_repo_outline(&h.store, "acme/sample");
    assert_eq!(outline["file_count"], 0);
    assert_eq!(outline["symbol_count"], 0);
}

#[test]
fn search_text_finds_substring_across_files() {
    let h = Harness::with_fixture("python_sample");
    h.ingest();

    let hits = query::search_text(&h.store, "acme/sample", "return id", None, 20);
    let results = hits["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["file"], "sample.py");
}

#[test]
fn invalidate_cache_removes_manifest_and_mirror() {
    let h = Harness::with_fixture("python_sample");
    h.ingest();

    let result = query::invalidate_cache(&h.store, "acme/sample");
    assert_eq!(result["success"], true);
    assert!(h.store.load_index("acme", "sample").is_none());

    let missing = query::get_repo_outline(&h.store, "acme/sample");
    assert!(missing.get("error").is_some());
}
