//! Step 1 of the feedback bridge: resolve a user-supplied identifier (PR
//! number, short ID, or full node ID) to a concrete target, per §4.9.

use crate::error::{FirewatchError, Result};
use crate::identity::{ClassifiedId, ShortIdCache, classify_id};
use crate::model::Entry;
use crate::store::{EntryFilter, Store};

/// What a resolved identifier points at.
#[derive(Debug, Clone)]
pub enum ResolvedTarget {
    /// A bare PR number — the action applies to the whole PR.
    Pr { repo: String, pr: u64 },
    /// A specific stored entry (comment or review).
    Entry(Entry),
}

impl ResolvedTarget {
    pub fn repo(&self) -> &str {
        match self {
            ResolvedTarget::Pr { repo, .. } => repo,
            ResolvedTarget::Entry(entry) => &entry.repo,
        }
    }

    pub fn pr(&self) -> u64 {
        match self {
            ResolvedTarget::Pr { pr, .. } => *pr,
            ResolvedTarget::Entry(entry) => entry.pr,
        }
    }

    /// A key distinguishing this resolved target for batch deduplication.
    pub fn dedup_key(&self) -> String {
        match self {
            ResolvedTarget::Pr { repo, pr } => format!("pr:{repo}#{pr}"),
            ResolvedTarget::Entry(entry) => format!("entry:{}:{}", entry.repo, entry.id),
        }
    }
}

/// Resolve `input` against `repo`, per §4.9 step 1:
/// - `pr_number` classifies as a whole-PR target.
/// - `short_id` looks up the in-process cache; on a miss, the cache is
///   rebuilt from the store's entries for `repo` and the lookup is retried
///   once.
/// - `full_id` queries the store directly.
/// - `unknown` is a hard validation error.
pub async fn resolve(store: &Store, cache: &mut ShortIdCache, repo: &str, input: &str) -> Result<ResolvedTarget> {
    match classify_id(input) {
        ClassifiedId::PrNumber(n) => Ok(ResolvedTarget::Pr {
            repo: repo.to_owned(),
            pr: n,
        }),
        ClassifiedId::ShortId(short) => resolve_short(store, cache, repo, &short).await,
        ClassifiedId::FullId(full) => resolve_full(store, repo, &full).await,
        ClassifiedId::Unknown => Err(FirewatchError::Validation("Invalid ID format".to_owned())),
    }
}

async fn resolve_short(store: &Store, cache: &mut ShortIdCache, repo: &str, short: &str) -> Result<ResolvedTarget> {
    if let Some(target) = cache.resolve(short).cloned() {
        return entry_by_id(store, &target.repo, &target.full_id).await;
    }

    rebuild_cache(store, cache, repo).await?;

    match cache.resolve(short).cloned() {
        Some(target) => entry_by_id(store, &target.repo, &target.full_id).await,
        None => Err(FirewatchError::NotFound(format!("no entry matches short id {short}"))),
    }
}

async fn resolve_full(store: &Store, repo: &str, full_id: &str) -> Result<ResolvedTarget> {
    entry_by_id(store, repo, full_id).await
}

async fn entry_by_id(store: &Store, repo: &str, full_id: &str) -> Result<ResolvedTarget> {
    let filter = EntryFilter {
        repo: Some(repo.to_owned()),
        exact_repo: true,
        id: Some(full_id.to_owned()),
        ..Default::default()
    };
    let mut entries = store.query_entries(&filter, Some(1), None).await?;
    entries
        .pop()
        .map(ResolvedTarget::Entry)
        .ok_or_else(|| FirewatchError::NotFound(format!("no entry with id {full_id}")))
}

/// Rebuild the short-id cache from every entry currently stored for `repo`,
/// registering targets in insertion (query) order — first-registered wins
/// on collision, per §4.1.
pub async fn rebuild_cache(store: &Store, cache: &mut ShortIdCache, repo: &str) -> Result<()> {
    let entries = store.query_entries(&EntryFilter::for_repo(repo), None, None).await?;
    cache.clear();
    for entry in &entries {
        cache.register(entry.short_id_target());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::{Entry, EntryType, PrState};

    fn sample_entry(id: &str) -> Entry {
        Entry {
            id: id.to_owned(),
            repo: "acme/widgets".into(),
            pr: 7,
            entry_type: EntryType::Comment,
            subtype: Some("review_comment".into()),
            author: "alice".into(),
            body: Some("hi".into()),
            state: None,
            file: Some("src/lib.rs".into()),
            line: Some(1),
            thread_id: Some("thread1".into()),
            thread_resolved: Some(false),
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

    #[tokio::test]
    async fn resolves_pr_number_without_touching_store() {
        let store = Store::open_in_memory().await.unwrap();
        let mut cache = ShortIdCache::new();
        let target = resolve(&store, &mut cache, "acme/widgets", "42").await.unwrap();
        assert_eq!(target.pr(), 42);
        assert!(matches!(target, ResolvedTarget::Pr { .. }));
    }

    #[tokio::test]
    async fn resolves_short_id_via_cache_rebuild_on_miss() {
        let store = Store::open_in_memory().await.unwrap();
        let entry = sample_entry("abc123");
        store.insert_entries(&[entry.clone()]).await.unwrap();

        let short = crate::identity::generate_short_id(&entry.id, &entry.repo);
        let mut cache = ShortIdCache::new();
        let target = resolve(&store, &mut cache, "acme/widgets", &short).await.unwrap();
        match target {
            ResolvedTarget::Entry(e) => assert_eq!(e.id, "abc123"),
            _ => panic!("expected Entry"),
        }
    }

    #[tokio::test]
    async fn unknown_shape_is_a_validation_error() {
        let store = Store::open_in_memory().await.unwrap();
        let mut cache = ShortIdCache::new();
        let err = resolve(&store, &mut cache, "acme/widgets", "!!!").await.unwrap_err();
        assert!(matches!(err, FirewatchError::Validation(_)));
    }

    #[tokio::test]
    async fn full_id_queries_store_directly() {
        let store = Store::open_in_memory().await.unwrap();
        let entry = sample_entry("MDEyOklzc3VlQ29tbWVudDEyMzQ1Njc4OQ==_full_node_id_shape");
        store.insert_entries(&[entry.clone()]).await.unwrap();

        let mut cache = ShortIdCache::new();
        let target = resolve(&store, &mut cache, "acme/widgets", &entry.id).await.unwrap();
        match target {
            ResolvedTarget::Entry(e) => assert_eq!(e.id, entry.id),
            _ => panic!("expected Entry"),
        }
    }
}
