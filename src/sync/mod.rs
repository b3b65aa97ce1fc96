//! The sync engine: pulls PR activity for one `(repo, scope)` pair,
//! flattens it into entries, runs enrichers, and writes everything
//! transactionally, per §4.4.

pub mod enrich;
pub mod staleness;

pub use staleness::check as check_staleness;

use chrono::{DateTime, Utc};

use crate::error::{FirewatchError, Result};
use crate::github::GitHubGateway;
use crate::model::{Scope, SyncMeta};
use crate::store::Store;
use crate::sync::enrich::Enricher;

const PAGE_LOG_TARGET: &str = "firewatch::sync";

/// Request shape for one `sync_repo` call.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Ignore the stored cursor and start from the beginning.
    pub full: bool,
    /// Stop fetching once a page's oldest PR was last updated before this.
    pub since: Option<DateTime<Utc>>,
}

/// Outcome of one `sync_repo` call, per §4.4 step 6.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub entries_added: u64,
    pub prs_processed: u64,
    pub cursor: Option<String>,
}

/// Sync one `(repo, scope)` pair to completion (or until `since`/the end of
/// the PR stream is reached), running `enrichers` over every entry before
/// it's written.
///
/// Page-level gateway errors abort the run; the cursor written by the last
/// successfully committed page is left in place (§4.4's failure policy).
pub async fn sync_repo(
    store: &Store,
    gateway: &GitHubGateway,
    repo: &str,
    scope: Scope,
    options: &SyncOptions,
    enrichers: &[Box<dyn Enricher>],
) -> Result<SyncReport> {
    let (owner, name) = crate::model::split_repo(repo)
        .ok_or_else(|| FirewatchError::Validation(format!("invalid repo slug: {repo}")))?;

    let prior = store.get_sync_meta(repo, scope).await?;
    let mut cursor = if options.full { None } else { prior.and_then(|m| m.cursor) };

    let mut report = SyncReport::default();

    loop {
        let page = gateway.fetch_pr_activity(owner, name, scope, cursor.clone()).await?;

        for meta in &page.prs {
            store.upsert_pr(meta).await?;
        }

        let mut entries = Vec::with_capacity(page.entries.len());
        for entry in page.entries {
            let mut entry = entry;
            for enricher in enrichers {
                entry = enricher.enrich(entry).await;
            }
            entries.push(entry);
        }

        let inserted = store.insert_entries(&entries).await?;
        report.entries_added += inserted;
        report.prs_processed += page.prs.len() as u64;

        cursor = page.end_cursor.clone();
        store
            .set_sync_meta(&SyncMeta {
                repo: repo.to_owned(),
                scope,
                last_sync: Utc::now(),
                cursor: cursor.clone(),
                pr_count: report.prs_processed,
            })
            .await?;

        tracing::debug!(
            target: PAGE_LOG_TARGET,
            repo,
            scope = scope.as_str(),
            prs = page.prs.len(),
            entries = inserted,
            "sync page committed"
        );

        let hit_since_cutoff = options
            .since
            .zip(page.last_updated_at)
            .is_some_and(|(since, last)| last < since);

        if !page.has_next_page || hit_since_cutoff {
            break;
        }
    }

    report.cursor = cursor;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_options_default_is_incremental_with_no_cutoff() {
        let options = SyncOptions::default();
        assert!(!options.full);
        assert!(options.since.is_none());
    }
}
