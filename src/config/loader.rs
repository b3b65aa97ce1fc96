use std::path::{Path, PathBuf};

use toml::Value;

use crate::config::types::AppConfig;
use crate::error::{FirewatchError, Result};
use crate::identity::paths::{PROJECT_CONFIG_FILE, user_config_path};

/// Load the effective config, per §4.10: defaults, then user config, then
/// project config (discovered by walking up from `cwd` to the first
/// directory containing `.git` or `.firewatch.toml`), then environment
/// variables — each layer overriding the keys it sets, leaving the rest
/// from the layer below.
///
/// `explicit_path`, when given, is loaded as the user-config layer instead
/// of the XDG default (mirrors `--config`).
pub fn load_config(cwd: &Path, explicit_path: Option<&Path>) -> Result<AppConfig> {
    let mut merged = Value::Table(toml::map::Map::new());

    let user_path = explicit_path.map(Path::to_path_buf).or_else(user_config_path);
    if let Some(user_path) = user_path {
        if let Some(layer) = read_toml_layer(&user_path)? {
            merge_toml(&mut merged, layer);
        }
    }

    if let Some(project_path) = find_project_config(cwd) {
        if let Some(layer) = read_toml_layer(&project_path)? {
            merge_toml(&mut merged, layer);
        }
    }

    apply_env_overrides(&mut merged);

    merged
        .try_into()
        .map_err(|e| FirewatchError::Config(format!("invalid config: {e}")))
}

fn read_toml_layer(path: &Path) -> Result<Option<Value>> {
    if !path.is_file() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)
        .map_err(|e| FirewatchError::Config(format!("reading {}: {e}", path.display())))?;
    let value: Value = toml::from_str(&contents)
        .map_err(|e| FirewatchError::Config(format!("parsing {}: {e}", path.display())))?;
    Ok(Some(value))
}

/// Walk up from `cwd` looking for `.firewatch.toml`, stopping at the first
/// `.git` directory found (the repo root) whether or not a config file was
/// found there.
fn find_project_config(cwd: &Path) -> Option<PathBuf> {
    let mut dir = cwd.to_path_buf();
    loop {
        let candidate = dir.join(PROJECT_CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        if dir.join(".git").exists() {
            return None;
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Recursively merge `overlay` into `base`, with `overlay`'s keys taking
/// precedence. Tables are merged key-by-key; any other value (including
/// arrays) is replaced wholesale.
fn merge_toml(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Table(base_table), Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Apply `FIREWATCH_*` overrides, dotted-to-underscore mapped (e.g.
/// `FIREWATCH_SYNC_AUTO_SYNC` -> `sync.auto_sync`), comma-split lists,
/// `1|true`/`0|false` booleans.
fn apply_env_overrides(merged: &mut Value) {
    const SECTIONS: &[(&str, &[&str])] = &[
        ("user", &["github_username"]),
        ("sync", &["auto_sync", "stale_threshold"]),
        ("filters", &["exclude_bots", "exclude_authors", "bot_patterns"]),
        ("output", &["default_format"]),
        ("feedback", &["commit_implies_read"]),
    ];

    if let Ok(token) = std::env::var("FIREWATCH_GITHUB_TOKEN") {
        set_path(merged, &["github_token"], Value::String(token));
    }
    if let Ok(repos) = std::env::var("FIREWATCH_REPOS") {
        set_path(merged, &["repos"], csv_array(&repos));
    }

    for (section, keys) in SECTIONS {
        for key in *keys {
            let var = format!("FIREWATCH_{}_{}", section.to_uppercase(), key.to_uppercase());
            if let Ok(raw) = std::env::var(&var) {
                let value = env_value_for(section, key, &raw);
                set_path(merged, &[section, key], value);
            }
        }
    }
}

fn env_value_for(section: &str, key: &str, raw: &str) -> Value {
    let is_list = matches!((section, key), ("filters", "exclude_authors") | ("filters", "bot_patterns"));
    let is_bool = matches!(
        (section, key),
        ("sync", "auto_sync") | ("filters", "exclude_bots") | ("feedback", "commit_implies_read")
    );
    if is_list {
        csv_array(raw)
    } else if is_bool {
        Value::Boolean(matches!(raw, "1" | "true"))
    } else {
        Value::String(raw.to_owned())
    }
}

fn csv_array(raw: &str) -> Value {
    Value::Array(
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Value::String(s.to_owned()))
            .collect(),
    )
}

fn set_path(root: &mut Value, path: &[&str], value: Value) {
    let Value::Table(table) = root else {
        return;
    };
    let Some((last, rest)) = path.split_last() else {
        return;
    };
    let mut cursor = table;
    for segment in rest {
        cursor = cursor
            .entry(segment.to_string())
            .or_insert_with(|| Value::Table(toml::map::Map::new()))
            .as_table_mut()
            .expect("config path segment is not a table");
    }
    cursor.insert(last.to_string(), value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_config_overrides_user_config() {
        let dir = tempfile::tempdir().unwrap();
        let user_path = dir.path().join("user.toml");
        std::fs::write(&user_path, "repos = [\"acme/widgets\"]\n[sync]\nauto_sync = false\n").unwrap();

        let project_dir = dir.path().join("project");
        std::fs::create_dir(&project_dir).unwrap();
        std::fs::create_dir(project_dir.join(".git")).unwrap();
        std::fs::write(
            project_dir.join(PROJECT_CONFIG_FILE),
            "repos = [\"acme/other\"]\n",
        )
        .unwrap();

        let cfg = load_config(&project_dir, Some(&user_path)).unwrap();
        assert_eq!(cfg.repos, vec!["acme/other".to_owned()]);
        // sync.auto_sync was only set by the user layer, and survives the merge.
        assert!(!cfg.sync.auto_sync);
    }

    #[test]
    fn missing_config_files_yield_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(dir.path(), Some(&dir.path().join("nope.toml"))).unwrap();
        assert!(cfg.repos.is_empty());
        assert!(cfg.sync.auto_sync);
    }

    #[test]
    fn env_override_wins_over_files() {
        let dir = tempfile::tempdir().unwrap();
        unsafe {
            std::env::set_var("FIREWATCH_SYNC_AUTO_SYNC", "false");
        }
        let cfg = load_config(dir.path(), Some(&dir.path().join("nope.toml"))).unwrap();
        unsafe {
            std::env::remove_var("FIREWATCH_SYNC_AUTO_SYNC");
        }
        assert!(!cfg.sync.auto_sync);
    }
}
