//! Persistent index store: one JSON manifest plus a mirrored content tree
//! per repository, atomic writes, version gating, change detection,
//! incremental save, and O(1) byte-range symbol retrieval.
//!
//! Grounded on the original implementation's `storage/index_store.py`;
//! nothing here runs the parser — `IndexStore` only ever moves bytes and
//! manifests around.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::index::CodeIndex;
use crate::symbol::Symbol;

/// Current manifest schema version. A manifest with a higher value refuses
/// to load and is treated as "missing."
pub const INDEX_VERSION: u32 = 2;

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    repo: String,
    owner: String,
    name: String,
    indexed_at: String,
    source_files: Vec<String>,
    languages: HashMap<String, u32>,
    symbols: Vec<Symbol>,
    index_version: u32,
    #[serde(default)]
    file_hashes: HashMap<String, String>,
    #[serde(default)]
    git_head: String,
}

/// The three-way partition produced by comparing current file content
/// against a previously saved manifest.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    pub changed: Vec<String>,
    pub new: Vec<String>,
    pub deleted: Vec<String>,
}

pub struct IndexStore {
    base_path: PathBuf,
}

impl IndexStore {
    pub fn new(base_path: PathBuf) -> Self {
        IndexStore { base_path }
    }

    fn index_path(&self, owner: &str, name: &str) -> PathBuf {
        self.base_path.join(format!("{owner}-{name}.json"))
    }

    fn content_dir(&self, owner: &str, name: &str) -> PathBuf {
        self.base_path.join(format!("{owner}-{name}"))
    }

    /// Path of one mirrored file, for callers (query tools) that need to
    /// read a file's full contents rather than one symbol's byte range.
    pub fn mirror_path(&self, owner: &str, name: &str, file: &str) -> PathBuf {
        self.content_dir(owner, name).join(file)
    }

    /// Full save: builds a fresh manifest from scratch and atomically
    /// replaces any prior one for this repo.
    #[allow(clippy::too_many_arguments)]
    pub fn save(
        &self,
        owner: &str,
        name: &str,
        source_files: Vec<String>,
        symbols: Vec<Symbol>,
        raw_files: &HashMap<String, Vec<u8>>,
        languages: HashMap<String, u32>,
        git_head: String,
    ) -> std::io::Result<()> {
        fs::create_dir_all(&self.base_path)?;

        let mut file_hashes = HashMap::new();
        for (path, bytes) in raw_files {
            file_hashes.insert(path.clone(), hash_bytes(bytes));
        }

        let mut sorted_files = source_files;
        sorted_files.sort();

        let manifest = Manifest {
            repo: format!("{owner}/{name}"),
            owner: owner.to_string(),
            name: name.to_string(),
            indexed_at: now_iso8601(),
            source_files: sorted_files,
            languages,
            symbols,
            index_version: INDEX_VERSION,
            file_hashes,
            git_head,
        };

        self.write_manifest_atomic(owner, name, &manifest)?;
        self.write_mirror(owner, name, raw_files)?;
        debug!(repo = %manifest.repo, files = manifest.source_files.len(), "saved index");
        Ok(())
    }

    /// Load the manifest as a read-only [`CodeIndex`]. Returns `None` when
    /// missing, corrupt, or stamped with a future schema version — never an
    /// error, per SPEC_FULL.md §4.4.
    pub fn load_index(&self, owner: &str, name: &str) -> Option<CodeIndex> {
        let path = self.index_path(owner, name);
        let contents = fs::read_to_string(&path).ok()?;
        let manifest: Manifest = match serde_json::from_str(&contents) {
            Ok(m) => m,
            Err(e) => {
                warn!(repo = format!("{owner}/{name}"), error = %e, "manifest failed to parse");
                return None;
            }
        };

        if manifest.index_version > INDEX_VERSION {
            warn!(repo = %manifest.repo, version = manifest.index_version, "refusing future schema version");
            return None;
        }

        Some(CodeIndex::new(
            manifest.repo,
            manifest.indexed_at,
            manifest.source_files,
            manifest.languages,
            manifest.symbols,
            manifest.file_hashes,
            manifest.git_head,
        ))
    }

    /// O(1) byte-range read of one symbol's source from the mirror. Decodes
    /// with UTF-8 replacement; never re-parses.
    pub fn get_symbol_content(&self, owner: &str, name: &str, symbol_id: &str) -> Option<String> {
        let index = self.load_index(owner, name)?;
        let symbol = index.get(symbol_id)?;
        let path = self.content_dir(owner, name).join(&symbol.file);

        let mut file = fs::File::open(&path).ok()?;
        file.seek(SeekFrom::Start(symbol.byte_offset as u64)).ok()?;
        let mut buf = vec![0u8; symbol.byte_length];
        file.read_exact(&mut buf).ok()?;
        Some(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Compare `current_files` against the stored manifest's file hashes.
    pub fn detect_changes(&self, owner: &str, name: &str, current_files: &HashMap<String, Vec<u8>>) -> ChangeSet {
        let prior = self.load_index(owner, name);

        let current_hashes: HashMap<&String, String> =
            current_files.iter().map(|(path, bytes)| (path, hash_bytes(bytes))).collect();

        let Some(prior) = prior else {
            return ChangeSet { new: current_files.keys().cloned().collect(), ..Default::default() };
        };

        let stored_paths: HashSet<&String> = prior.file_hashes.keys().collect();
        let current_paths: HashSet<&String> = current_files.keys().collect();

        let mut changed = Vec::new();
        let mut new = Vec::new();
        for path in &current_paths {
            match prior.file_hashes.get(path.as_str()) {
                Some(stored_hash) if stored_hash == &current_hashes[*path] => {}
                Some(_) => changed.push((*path).clone()),
                None => new.push((*path).clone()),
            }
        }
        let deleted: Vec<String> = stored_paths.difference(&current_paths).map(|s| (*s).clone()).collect();

        ChangeSet { changed, new, deleted }
    }

    /// Apply a pre-computed [`ChangeSet`] plus freshly parsed symbols for
    /// `changed ∪ new` files. Returns `None` if there is no prior manifest.
    #[allow(clippy::too_many_arguments)]
    pub fn incremental_save(
        &self,
        owner: &str,
        name: &str,
        changes: &ChangeSet,
        fresh_symbols: Vec<Symbol>,
        raw_files: &HashMap<String, Vec<u8>>,
        languages: HashMap<String, u32>,
        git_head: String,
    ) -> std::io::Result<Option<()>> {
        let path = self.index_path(owner, name);
        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Ok(None),
        };
        let mut manifest: Manifest = match serde_json::from_str(&contents) {
            Ok(m) => m,
            Err(_) => return Ok(None),
        };
        if manifest.index_version > INDEX_VERSION {
            return Ok(None);
        }

        let touched: HashSet<&str> =
            changes.changed.iter().chain(changes.deleted.iter()).map(|s| s.as_str()).collect();
        manifest.symbols.retain(|s| !touched.contains(s.file.as_str()));
        manifest.symbols.extend(fresh_symbols);

        let mut files: HashSet<String> = manifest.source_files.into_iter().collect();
        for f in &changes.deleted {
            files.remove(f);
        }
        for f in changes.new.iter().chain(changes.changed.iter()) {
            files.insert(f.clone());
        }
        let mut source_files: Vec<String> = files.into_iter().collect();
        source_files.sort();
        manifest.source_files = source_files;

        for f in &changes.deleted {
            manifest.file_hashes.remove(f);
        }
        for (path, bytes) in raw_files {
            manifest.file_hashes.insert(path.clone(), hash_bytes(bytes));
        }

        manifest.languages = languages;
        manifest.git_head = git_head;
        manifest.indexed_at = now_iso8601();
        manifest.index_version = INDEX_VERSION;

        self.write_manifest_atomic(owner, name, &manifest)?;

        let mirror = self.content_dir(owner, name);
        for f in &changes.deleted {
            let _ = fs::remove_file(mirror.join(f));
        }
        self.write_mirror(owner, name, raw_files)?;

        debug!(repo = %manifest.repo, changed = changes.changed.len(), new = changes.new.len(), deleted = changes.deleted.len(), "incremental save");
        Ok(Some(()))
    }

    /// Scan the base directory for manifests, tolerating malformed entries.
    pub fn list_repos(&self) -> Vec<RepoSummary> {
        let Ok(entries) = fs::read_dir(&self.base_path) else {
            return Vec::new();
        };

        let mut repos = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(contents) = fs::read_to_string(&path) else { continue };
            let Ok(manifest) = serde_json::from_str::<Manifest>(&contents) else { continue };
            repos.push(RepoSummary {
                repo: manifest.repo,
                indexed_at: manifest.indexed_at,
                file_count: manifest.source_files.len(),
                symbol_count: manifest.symbols.len(),
            });
        }
        repos
    }

    /// Remove the manifest and mirror directory for a repo. Returns whether
    /// anything existed to remove.
    pub fn delete_index(&self, owner: &str, name: &str) -> bool {
        let manifest_path = self.index_path(owner, name);
        let content_dir = self.content_dir(owner, name);
        let removed_manifest = fs::remove_file(&manifest_path).is_ok();
        let removed_mirror = fs::remove_dir_all(&content_dir).is_ok();
        removed_manifest || removed_mirror
    }

    fn write_manifest_atomic(&self, owner: &str, name: &str, manifest: &Manifest) -> std::io::Result<()> {
        let target = self.index_path(owner, name);
        let tmp = target.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(manifest)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &target)?;
        Ok(())
    }

    fn write_mirror(&self, owner: &str, name: &str, raw_files: &HashMap<String, Vec<u8>>) -> std::io::Result<()> {
        let content_dir = self.content_dir(owner, name);
        for (path, bytes) in raw_files {
            let dest = content_dir.join(path);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&dest, bytes)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RepoSummary {
    pub repo: String,
    pub indexed_at: String,
    pub file_count: usize,
    pub symbol_count: usize,
}

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339()
}
