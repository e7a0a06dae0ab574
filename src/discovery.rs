//! Thin local-folder walker standing in for the out-of-scope repository
//! fetcher. Applies gitignore filtering plus the security gates (symlink
//! escape, path traversal, secret files, binary sniffing, size caps) and
//! nothing else — no network fetch, no remote API.

use std::fs;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use tracing::debug;

use crate::error::{ErrorKind, Warning};

pub const DEFAULT_MAX_FILE_SIZE: u64 = 500 * 1024;
pub const DEFAULT_MAX_FILES: usize = 500;

const SKIP_SUBSTRINGS: &[&str] = &[
    "node_modules/",
    "vendor/",
    "venv/",
    ".venv/",
    "__pycache__/",
    "dist/",
    "build/",
    ".git/",
    ".tox/",
    ".mypy_cache/",
    "target/",
    ".gradle/",
    "test_data/",
    "testdata/",
    "fixtures/",
    "snapshots/",
    "migrations/",
    ".min.js",
    ".min.ts",
    ".bundle.js",
    "package-lock.json",
    "yarn.lock",
    "go.sum",
    "generated/",
    "proto/",
];

const SECRET_PATTERNS: &[&str] = &[
    "*.env",
    ".env",
    ".env.*",
    "*.pem",
    "*.key",
    "*.p12",
    "*.pfx",
    "*.credentials",
    "*.keystore",
    "*.jks",
    "*.token",
    "*secret*",
    "id_rsa",
    "id_rsa.*",
    "id_ed25519",
    "id_ed25519.*",
    "id_dsa",
    "id_ecdsa",
    ".htpasswd",
    ".netrc",
    ".npmrc",
    ".pypirc",
    "credentials.json",
    "service-account*.json",
    "*.secrets",
];

const BINARY_EXTENSIONS: &[&str] = &[
    "exe", "dll", "so", "dylib", "bin", "out", "o", "obj", "a", "lib", "zip", "tar", "gz", "bz2",
    "xz", "7z", "rar", "png", "jpg", "jpeg", "gif", "bmp", "ico", "svg", "webp", "tiff", "tif",
    "mp3", "mp4", "avi", "mov", "mkv", "wav", "flac", "ogg", "webm", "pdf", "doc", "docx", "xls",
    "xlsx", "ppt", "pptx", "pyc", "pyo", "class", "wasm", "db", "sqlite", "sqlite3", "ttf", "otf",
    "woff", "woff2", "eot", "jar", "war", "ear",
];

const PRIORITY_DIRS: &[&str] = &["src/", "lib/", "pkg/", "cmd/", "internal/"];

/// One discovered file, relative path plus its raw bytes.
pub struct DiscoveredFile {
    pub path: String,
    pub bytes: Vec<u8>,
}

#[derive(Default)]
pub struct DiscoveryResult {
    pub files: Vec<DiscoveredFile>,
    pub warnings: Vec<Warning>,
    pub truncated: bool,
}

/// Walk `root`, returning files the pipeline should parse plus any warnings
/// for entries skipped along the way. Never fails: unreadable directories
/// simply yield fewer files.
pub fn discover(root: &Path, max_files: usize, max_size: u64) -> DiscoveryResult {
    let root = match root.canonicalize() {
        Ok(r) => r,
        Err(_) => return DiscoveryResult::default(),
    };

    let mut candidates: Vec<PathBuf> = Vec::new();
    let mut warnings = Vec::new();

    let walker = WalkBuilder::new(&root)
        .follow_links(false)
        .git_ignore(true)
        .hidden(false)
        .build();

    for entry in walker.flatten() {
        let path = entry.path();
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }

        let rel = match path.strip_prefix(&root) {
            Ok(r) => r.to_string_lossy().replace('\\', "/"),
            Err(_) => continue,
        };

        if is_symlink_escape(&root, path) {
            warnings.push(Warning::new(rel.clone(), ErrorKind::SymlinkEscape));
            continue;
        }
        if !validate_path(&root, path) {
            warnings.push(Warning::new(rel.clone(), ErrorKind::PathTraversal));
            continue;
        }
        if should_skip(&rel) {
            continue;
        }
        if is_secret_file(&rel) {
            warnings.push(Warning::new(rel.clone(), ErrorKind::SecretFile));
            continue;
        }

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_lowercase();
        if crate::symbol::Language::from_extension(&ext).is_none() {
            continue;
        }

        let size = match fs::metadata(path) {
            Ok(m) => m.len(),
            Err(_) => continue,
        };
        if size > max_size {
            warnings.push(Warning::new(rel.clone(), ErrorKind::FileTooLarge));
            continue;
        }

        if is_binary_extension(&ext) || is_binary_content(path) {
            warnings.push(Warning::new(rel.clone(), ErrorKind::BinaryExtension));
            continue;
        }

        candidates.push(path.to_path_buf());
    }

    let truncated = candidates.len() > max_files;
    if truncated {
        candidates.sort_by_key(|p| priority_key(&root, p));
        candidates.truncate(max_files);
        debug!(kept = max_files, "discovery truncated file list");
    }

    let mut files = Vec::with_capacity(candidates.len());
    for path in candidates {
        let Ok(bytes) = fs::read(&path) else { continue };
        let rel = path.strip_prefix(&root).unwrap().to_string_lossy().replace('\\', "/");
        files.push(DiscoveredFile { path: rel, bytes });
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));

    DiscoveryResult { files, warnings, truncated }
}

fn priority_key(root: &Path, path: &Path) -> (usize, usize, String) {
    let rel = path.strip_prefix(root).unwrap_or(path).to_string_lossy().replace('\\', "/");
    for (i, prefix) in PRIORITY_DIRS.iter().enumerate() {
        if rel.starts_with(prefix) {
            return (i, rel.matches('/').count(), rel);
        }
    }
    (PRIORITY_DIRS.len(), rel.matches('/').count(), rel)
}

fn validate_path(root: &Path, target: &Path) -> bool {
    match target.canonicalize() {
        Ok(resolved) => resolved.starts_with(root),
        Err(_) => false,
    }
}

fn is_symlink_escape(root: &Path, path: &Path) -> bool {
    let Ok(meta) = fs::symlink_metadata(path) else { return true };
    if !meta.file_type().is_symlink() {
        return false;
    }
    match path.canonicalize() {
        Ok(resolved) => !resolved.starts_with(root),
        Err(_) => true,
    }
}

fn should_skip(rel_path: &str) -> bool {
    SKIP_SUBSTRINGS.iter().any(|p| rel_path.contains(p))
}

fn is_secret_file(rel_path: &str) -> bool {
    let name = Path::new(rel_path)
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let path_lower = rel_path.to_lowercase();

    SECRET_PATTERNS.iter().any(|pat| glob_match(pat, &name) || glob_match(pat, &path_lower))
}

/// Minimal `fnmatch`-style glob: `*` matches any run of characters, no other
/// wildcards are needed for the secret-file pattern list above.
fn glob_match(pattern: &str, text: &str) -> bool {
    fn inner(p: &[u8], t: &[u8]) -> bool {
        match (p.first(), t.first()) {
            (None, None) => true,
            (Some(b'*'), _) => {
                inner(&p[1..], t) || (!t.is_empty() && inner(p, &t[1..]))
            }
            (Some(pc), Some(tc)) if pc == tc => inner(&p[1..], &t[1..]),
            _ => false,
        }
    }
    inner(pattern.as_bytes(), text.as_bytes())
}

fn is_binary_extension(ext: &str) -> bool {
    BINARY_EXTENSIONS.contains(&ext)
}

fn is_binary_content(path: &Path) -> bool {
    use std::io::Read;
    let Ok(mut file) = fs::File::open(path) else { return true };
    let mut buf = [0u8; 8192];
    let Ok(n) = file.read(&mut buf) else { return true };
    buf[..n].contains(&0)
}

/// Track which extensions were actually encountered, for the `languages`
/// field of the manifest.
pub fn language_counts(files: &[DiscoveredFile]) -> std::collections::HashMap<String, u32> {
    let mut counts = std::collections::HashMap::new();
    for f in files {
        let ext = Path::new(&f.path).extension().and_then(|e| e.to_str()).unwrap_or("");
        if let Some(lang) = crate::symbol::Language::from_extension(ext) {
            *counts.entry(lang.as_str().to_string()).or_insert(0) += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_env_file_is_detected() {
        assert!(is_secret_file(".env"));
        assert!(is_secret_file("config/.env.production"));
        assert!(is_secret_file("id_rsa"));
        assert!(!is_secret_file("main.py"));
    }

    #[test]
    fn binary_extension_detected() {
        assert!(is_binary_extension("png"));
        assert!(!is_binary_extension("py"));
    }

    #[test]
    fn skip_patterns_match_common_dirs() {
        assert!(should_skip("node_modules/left-pad/index.js"));
        assert!(should_skip("target/debug/build.rs"));
        assert!(!should_skip("src/main.rs"));
    }

    #[test]
    fn discover_reads_source_files_and_skips_noise() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("node_modules/pkg.js"), b"noop()").unwrap();
        fs::write(dir.path().join("main.py"), b"def main():\n    pass\n").unwrap();
        fs::write(dir.path().join("image.png"), b"\x89PNG").unwrap();
        fs::write(dir.path().join(".env"), b"SECRET=1").unwrap();

        let result = discover(dir.path(), DEFAULT_MAX_FILES, DEFAULT_MAX_FILE_SIZE);
        let paths: Vec<&str> = result.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["main.py"]);
        assert!(!result.warnings.is_empty());
    }

    #[test]
    fn oversized_file_is_skipped_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("huge.py"), vec![b'x'; 128]).unwrap();

        let result = discover(dir.path(), DEFAULT_MAX_FILES, 64);
        assert!(result.files.is_empty());
        assert!(result.warnings.iter().any(|w| w.reason == "file_too_large"));
    }
}
