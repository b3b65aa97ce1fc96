//! Step 4 of the feedback bridge: multi-ID batching with deduplication,
//! time-filtering, and bounded parallelism, per §4.9.

use chrono::{DateTime, Utc};
use futures::future::join_all;

use crate::feedback::action::{ActionOutcome, FeedbackAction};
use crate::feedback::dispatch::{ThreadLocks, dispatch};
use crate::feedback::resolve::{ResolvedTarget, rebuild_cache, resolve};
use crate::github::GitHubGateway;
use crate::identity::ShortIdCache;
use crate::store::Store;

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub since: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    /// Reactions and acks run in parallel, bounded by this. Mutations
    /// sharing a review thread are still serialized via [`ThreadLocks`]
    /// regardless of this bound.
    pub max_parallel: usize,
}

impl BatchOptions {
    fn chunk_size(&self) -> usize {
        self.max_parallel.max(1)
    }
}

/// Resolve, dedupe, time-filter, then dispatch `action` against every id in
/// `ids`, returning one outcome per surviving id in input order.
pub async fn batch(
    store: &Store,
    gateway: Option<&GitHubGateway>,
    repo: &str,
    ids: &[String],
    action: &FeedbackAction,
    options: &BatchOptions,
    acked_by: Option<&str>,
) -> Vec<ActionOutcome> {
    let mut cache = ShortIdCache::new();
    let _ = rebuild_cache(store, &mut cache, repo).await;

    let mut resolved = Vec::with_capacity(ids.len());
    for id in ids {
        resolved.push((id.clone(), resolve(store, &mut cache, repo, id).await));
    }

    let deduped = dedup(resolved);
    let filtered = time_filter(deduped, options);

    let thread_locks = ThreadLocks::new();
    let mut outcomes = Vec::with_capacity(filtered.len());

    for chunk in filtered.chunks(options.chunk_size()) {
        let futures = chunk.iter().map(|(id, target)| {
            let thread_locks = thread_locks.clone();
            async move {
                match target {
                    Ok(target) => dispatch(store, gateway, &thread_locks, target, action, acked_by).await,
                    Err(err) => ActionOutcome::error(id.clone(), err.to_string()),
                }
            }
        });
        outcomes.extend(join_all(futures).await);
    }

    outcomes
}

/// Dedup by the resolved target's identity, keeping the first occurrence.
/// Unresolved (error) entries are never deduped — each is reported on its
/// own input.
fn dedup(resolved: Vec<(String, crate::error::Result<ResolvedTarget>)>) -> Vec<(String, crate::error::Result<ResolvedTarget>)> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(resolved.len());
    for (id, target) in resolved {
        if let Ok(target) = &target {
            if !seen.insert(target.dedup_key()) {
                continue;
            }
        }
        out.push((id, target));
    }
    out
}

fn time_filter(
    items: Vec<(String, crate::error::Result<ResolvedTarget>)>,
    options: &BatchOptions,
) -> Vec<(String, crate::error::Result<ResolvedTarget>)> {
    if options.since.is_none() && options.before.is_none() {
        return items;
    }
    items
        .into_iter()
        .filter(|(_, target)| match target {
            Ok(ResolvedTarget::Entry(entry)) => in_window(entry.created_at, options),
            // PR-number targets carry no single timestamp to filter on;
            // they always pass through.
            Ok(ResolvedTarget::Pr { .. }) => true,
            Err(_) => true,
        })
        .collect()
}

fn in_window(at: DateTime<Utc>, options: &BatchOptions) -> bool {
    if let Some(since) = options.since {
        if at < since {
            return false;
        }
    }
    if let Some(before) = options.before {
        if at > before {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entry, EntryType, PrState};

    fn sample_entry(id: &str, created_at: DateTime<Utc>) -> Entry {
        Entry {
            id: id.to_owned(),
            repo: "acme/widgets".into(),
            pr: 1,
            entry_type: EntryType::Comment,
            subtype: Some("issue_comment".into()),
            author: "alice".into(),
            body: Some("hi".into()),
            state: None,
            file: None,
            line: None,
            thread_id: None,
            thread_resolved: None,
            created_at,
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
    fn dedup_keeps_first_occurrence_by_resolved_key() {
        let now = Utc::now();
        let entry = sample_entry("dup", now);
        let resolved = vec![
            ("a".to_owned(), Ok(ResolvedTarget::Entry(entry.clone()))),
            ("b".to_owned(), Ok(ResolvedTarget::Entry(entry))),
        ];
        let out = dedup(resolved);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, "a");
    }

    #[test]
    fn time_filter_excludes_entries_before_since() {
        let now = Utc::now();
        let entry = sample_entry("old", now - chrono::Duration::days(2));
        let items = vec![("a".to_owned(), Ok(ResolvedTarget::Entry(entry)))];
        let options = BatchOptions {
            since: Some(now - chrono::Duration::days(1)),
            before: None,
            max_parallel: 4,
        };
        assert!(time_filter(items, &options).is_empty());
    }

    #[test]
    fn time_filter_passes_through_pr_number_targets() {
        let options = BatchOptions {
            since: Some(Utc::now()),
            before: None,
            max_parallel: 4,
        };
        let items = vec![(
            "1".to_owned(),
            Ok(ResolvedTarget::Pr {
                repo: "acme/widgets".to_owned(),
                pr: 1,
            }),
        )];
        assert_eq!(time_filter(items, &options).len(), 1);
    }
}
