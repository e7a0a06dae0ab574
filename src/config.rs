//! Base storage path resolution.
//!
//! Priority: explicit override, `CODETRACE_HOME` env var, `.codetrace.toml`
//! in the current directory, then `{home}/.code-index/`.

use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    storage: Option<StorageConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct StorageConfig {
    base_path: Option<String>,
}

/// Resolve the base path used by `IndexStore`, honoring the override chain.
pub fn resolve_base_path(override_path: Option<&str>) -> PathBuf {
    if let Some(p) = override_path {
        return PathBuf::from(p);
    }

    if let Ok(env_path) = std::env::var("CODETRACE_HOME") {
        if !env_path.is_empty() {
            return PathBuf::from(env_path);
        }
    }

    if let Some(path) = read_toml_base_path() {
        return path;
    }

    default_base_path()
}

fn read_toml_base_path() -> Option<PathBuf> {
    let contents = std::fs::read_to_string(".codetrace.toml").ok()?;
    let config: FileConfig = toml::from_str(&contents).ok()?;
    config.storage?.base_path.map(PathBuf::from)
}

fn default_base_path() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".code-index")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_override_wins() {
        assert_eq!(resolve_base_path(Some("/tmp/foo")), PathBuf::from("/tmp/foo"));
    }

    #[test]
    fn env_var_used_when_no_override() {
        std::env::set_var("CODETRACE_HOME", "/tmp/env-base");
        assert_eq!(resolve_base_path(None), PathBuf::from("/tmp/env-base"));
        std::env::remove_var("CODETRACE_HOME");
    }
}
