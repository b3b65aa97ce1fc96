//! XDG-style path resolution.
//!
//! Mirrors the precedence the teacher's config loader uses for
//! `$XDG_CONFIG_HOME`/`~/.config`, generalized to the three XDG roots
//! firewatch's external-interfaces section names, plus the legacy cache
//! layout under `cache/`.

use std::path::PathBuf;

const APP_DIR: &str = "firewatch";

/// Resolve a base directory from an XDG env var, falling back to
/// `$HOME/<fallback_rel>`.
fn resolve_base(xdg_var: &str, fallback_rel: &str) -> Option<PathBuf> {
    if let Ok(xdg) = std::env::var(xdg_var) {
        if !xdg.is_empty() {
            return Some(PathBuf::from(xdg).join(APP_DIR));
        }
    }
    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(fallback_rel).join(APP_DIR))
}

/// `$XDG_CACHE_HOME/firewatch` or `~/.cache/firewatch`.
pub fn cache_dir() -> Option<PathBuf> {
    resolve_base("XDG_CACHE_HOME", ".cache")
}

/// `$XDG_CONFIG_HOME/firewatch` or `~/.config/firewatch`.
pub fn config_dir() -> Option<PathBuf> {
    resolve_base("XDG_CONFIG_HOME", ".config")
}

/// `$XDG_DATA_HOME/firewatch` or `~/.local/share/firewatch`.
pub fn data_dir() -> Option<PathBuf> {
    resolve_base("XDG_DATA_HOME", ".local/share")
}

/// Path to the SQLite database file (plus WAL/SHM sidecars, managed by
/// sqlite itself).
pub fn db_path() -> Option<PathBuf> {
    cache_dir().map(|dir| dir.join("firewatch.db"))
}

/// Path to the legacy per-repo JSONL cache directory (read-only fallback).
pub fn legacy_repos_dir() -> Option<PathBuf> {
    cache_dir().map(|dir| dir.join("repos"))
}

/// Path to a single legacy per-repo JSONL file.
pub fn legacy_repo_jsonl(owner: &str, name: &str) -> Option<PathBuf> {
    legacy_repos_dir().map(|dir| dir.join(format!("{owner}-{name}.jsonl")))
}

/// Path to the legacy cursor file.
pub fn legacy_meta_jsonl() -> Option<PathBuf> {
    cache_dir().map(|dir| dir.join("meta.jsonl"))
}

/// Path to the user config file.
pub fn user_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Name of the project-local config file, discovered by walking up from CWD.
pub const PROJECT_CONFIG_FILE: &str = ".firewatch.toml";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_dir_prefers_xdg_env() {
        // SAFETY: test-local env mutation, restored immediately after.
        unsafe {
            std::env::set_var("XDG_CACHE_HOME", "/tmp/xdgcache");
        }
        let dir = cache_dir().unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/xdgcache/firewatch"));
        unsafe {
            std::env::remove_var("XDG_CACHE_HOME");
        }
    }

    #[test]
    fn db_path_lives_under_cache_dir() {
        unsafe {
            std::env::set_var("XDG_CACHE_HOME", "/tmp/xdgcache2");
        }
        assert_eq!(
            db_path().unwrap(),
            PathBuf::from("/tmp/xdgcache2/firewatch/firewatch.db")
        );
        unsafe {
            std::env::remove_var("XDG_CACHE_HOME");
        }
    }
}
