//! The query engine: pushes what it can into SQL via the store's
//! [`EntryFilter`], then applies the client-side refinements described in
//! §4.6 that the store doesn't know how to express (author allow/deny
//! lists, bot detection, freeze-cutoff suppression, orphan detection).

mod since;

pub use since::parse_since;

use std::collections::HashSet;

use regex::Regex;

use crate::error::{FirewatchError, Result};
use crate::model::{Entry, Freeze, FreezeKind};
use crate::store::EntryFilter;

/// Known bot-author suffixes/patterns, used when `bot_patterns` is empty.
const DEFAULT_BOT_PATTERNS: &[&str] = &[r"\[bot\]$", r"^dependabot", r"^renovate", r"^github-actions$"];

/// Wraps the store-level [`EntryFilter`] with the client-side refinements
/// the store can't push into SQL.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub filter: EntryFilter,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// Case-insensitive author include-list. Empty means "no restriction".
    pub include_authors: Vec<String>,
    pub exclude_authors: Vec<String>,
    pub exclude_bots: bool,
    pub bot_patterns: Vec<String>,
    pub orphaned_only: bool,
    /// Drop entries the viewer has already acked.
    pub exclude_acked: bool,
    /// Per §9(a): treat a later commit touching a review comment's file as
    /// equivalent to an ack for this filtering pass, without writing an
    /// actual `Ack` row. Only takes effect alongside `exclude_acked`.
    pub commit_implies_read: bool,
}

/// Run a query against the store, then apply client-side refinements,
/// sort, and paginate, per §4.6 steps 2-4.
pub async fn run(store: &crate::store::Store, options: &QueryOptions) -> Result<Vec<Entry>> {
    // Pagination (limit/offset) is applied after client-side filtering, so
    // don't push it into the store call — fetch everything the SQL filter
    // matches, refine, then paginate here.
    let mut entries = store.query_entries(&options.filter, None, None).await?;

    let freezes = store.list_freezes(options.filter.repo.as_deref()).await?;
    let bot_regexes = compile_bot_patterns(&options.bot_patterns)?;
    let acked_ids: HashSet<String> = if options.exclude_acked {
        store.get_acked_ids(options.filter.repo.as_deref()).await?.into_iter().collect()
    } else {
        HashSet::new()
    };

    entries.retain(|entry| passes_refinements(entry, options, &freezes, &bot_regexes, &acked_ids));

    // query_entries already sorts created_at DESC, id ASC; refinement only
    // removes rows, so the order survives.
    let entries = match (options.offset, options.limit) {
        (Some(offset), Some(limit)) => entries
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect(),
        (Some(offset), None) => entries.into_iter().skip(offset.max(0) as usize).collect(),
        (None, Some(limit)) => entries.into_iter().take(limit.max(0) as usize).collect(),
        (None, None) => entries,
    };

    Ok(entries)
}

fn passes_refinements(
    entry: &Entry,
    options: &QueryOptions,
    freezes: &[Freeze],
    bot_regexes: &[Regex],
    acked_ids: &HashSet<String>,
) -> bool {
    if options.exclude_acked {
        if acked_ids.contains(&entry.id) {
            return false;
        }
        if options.commit_implies_read && implies_read(entry) {
            return false;
        }
    }
    if !options.include_authors.is_empty()
        && !options
            .include_authors
            .iter()
            .any(|a| a.eq_ignore_ascii_case(&entry.author))
    {
        return false;
    }
    if options
        .exclude_authors
        .iter()
        .any(|a| a.eq_ignore_ascii_case(&entry.author))
    {
        return false;
    }
    if options.exclude_bots && bot_regexes.iter().any(|re| re.is_match(&entry.author)) {
        return false;
    }
    if is_frozen_out(entry, freezes) {
        return false;
    }
    if options.orphaned_only && !entry.is_orphaned() {
        return false;
    }
    true
}

/// A later commit touching the commented-on file stands in for an explicit
/// ack, per §9(a) — it never writes an `Ack` row, it only affects whether
/// this query run shows the entry.
fn implies_read(entry: &Entry) -> bool {
    entry
        .file_activity_after
        .as_ref()
        .is_some_and(|activity| activity.modified)
}

/// An entry is suppressed by a freeze when the freeze targets this entry's
/// thread (or the whole PR) and the entry was created after the freeze.
fn is_frozen_out(entry: &Entry, freezes: &[Freeze]) -> bool {
    freezes.iter().any(|freeze| {
        if freeze.repo != entry.repo || freeze.pr != entry.pr {
            return false;
        }
        let targets = match freeze.kind {
            FreezeKind::Pr => true,
            FreezeKind::Thread => entry.thread_id.as_deref() == Some(freeze.target_id.as_str()),
        };
        targets && entry.created_at > freeze.frozen_at
    })
}

fn compile_bot_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    let source: Vec<&str> = if patterns.is_empty() {
        DEFAULT_BOT_PATTERNS.to_vec()
    } else {
        patterns.iter().map(String::as_str).collect()
    };
    source
        .iter()
        .map(|p| {
            Regex::new(&format!("(?i){p}"))
                .map_err(|e| FirewatchError::Validation(format!("invalid bot pattern {p:?}: {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::{Entry, EntryType, PrState};

    fn sample_entry(author: &str) -> Entry {
        Entry {
            id: "abc".into(),
            repo: "acme/widgets".into(),
            pr: 1,
            entry_type: EntryType::Comment,
            subtype: Some("issue_comment".into()),
            author: author.into(),
            body: Some("hi".into()),
            state: None,
            file: None,
            line: None,
            thread_id: None,
            thread_resolved: None,
            created_at: Utc::now(),
            updated_at: None,
            captured_at: Utc::now(),
            url: None,
            pr_title: "Title".into(),
            pr_state: PrState::Open,
            pr_author: "bob".into(),
            pr_branch: "feature".into(),
            pr_labels: None,
            graphite: None,
            file_provenance: None,
            file_activity_after: None,
        }
    }

    #[test]
    fn default_bot_patterns_match_bracket_suffix() {
        let regexes = compile_bot_patterns(&[]).unwrap();
        assert!(regexes.iter().any(|re| re.is_match("some-app[bot]")));
        assert!(!regexes.iter().any(|re| re.is_match("alice")));
    }

    #[test]
    fn exclude_bots_filters_bracket_bot_author() {
        let entry = sample_entry("renovate[bot]");
        let options = QueryOptions {
            exclude_bots: true,
            ..Default::default()
        };
        let regexes = compile_bot_patterns(&options.bot_patterns).unwrap();
        assert!(!passes_refinements(&entry, &options, &[], &regexes, &HashSet::new()));
    }

    #[test]
    fn freeze_on_pr_suppresses_entries_created_after_it() {
        let entry = sample_entry("alice");
        let freeze = Freeze {
            repo: "acme/widgets".into(),
            pr: 1,
            kind: FreezeKind::Pr,
            target_id: "pr".into(),
            frozen_at: Utc::now() - chrono::Duration::hours(1),
        };
        assert!(is_frozen_out(&entry, &[freeze]));
    }

    #[test]
    fn include_authors_excludes_non_matching_case_insensitively() {
        let entry = sample_entry("Alice");
        let options = QueryOptions {
            include_authors: vec!["alice".to_owned()],
            ..Default::default()
        };
        let regexes = compile_bot_patterns(&[]).unwrap();
        assert!(passes_refinements(&entry, &options, &[], &regexes, &HashSet::new()));

        let options2 = QueryOptions {
            include_authors: vec!["bob".to_owned()],
            ..Default::default()
        };
        assert!(!passes_refinements(&entry, &options2, &[], &regexes, &HashSet::new()));
    }

    #[test]
    fn exclude_acked_suppresses_acked_ids() {
        let entry = sample_entry("alice");
        let options = QueryOptions {
            exclude_acked: true,
            ..Default::default()
        };
        let regexes = compile_bot_patterns(&[]).unwrap();
        let mut acked = HashSet::new();
        acked.insert(entry.id.clone());
        assert!(!passes_refinements(&entry, &options, &[], &regexes, &acked));
    }

    #[test]
    fn commit_implies_read_suppresses_modified_file_without_writing_an_ack() {
        let mut entry = sample_entry("alice");
        entry.file_activity_after = Some(crate::model::FileActivityAfter {
            modified: true,
            commits_touching_file: 1,
            latest_commit: Some("deadbeef".into()),
            latest_commit_at: Some(Utc::now()),
            resolver_unavailable: false,
        });
        let options = QueryOptions {
            exclude_acked: true,
            commit_implies_read: true,
            ..Default::default()
        };
        let regexes = compile_bot_patterns(&[]).unwrap();
        assert!(!passes_refinements(&entry, &options, &[], &regexes, &HashSet::new()));

        // Without commit_implies_read, the same entry still passes.
        let options2 = QueryOptions {
            exclude_acked: true,
            commit_implies_read: false,
            ..Default::default()
        };
        assert!(passes_refinements(&entry, &options2, &[], &regexes, &HashSet::new()));
    }
}
