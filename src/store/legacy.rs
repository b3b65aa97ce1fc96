//! Read-only fallback for the legacy JSONL cache
//! (`cache/repos/<owner>-<name>.jsonl`). Writers always target the
//! relational store; this module only helps migrate/inspect old caches.

use std::path::Path;

use crate::model::Entry;
use crate::store::error::{DbError, DbResult};

/// Parse a legacy per-repo JSONL file into entries, skipping lines that fail
/// to parse (the legacy format predates several fields added here).
pub fn read_legacy_repo_jsonl(path: &Path) -> DbResult<Vec<Entry>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| DbError::Internal(format!("reading {}: {e}", path.display())))?;

    Ok(contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str::<Entry>(line).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparseable_lines_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acme-widgets.jsonl");
        std::fs::write(&path, "not json\n{}\n").unwrap();
        let entries = read_legacy_repo_jsonl(&path).unwrap();
        assert!(entries.is_empty());
    }
}
