//! The staleness check (`check`), §4.5: for every review-comment entry,
//! determine whether any later commit on the same PR touched its file, and
//! write the result back onto the entry.

use std::collections::HashMap;

use crate::error::Result;
use crate::github::GitHubGateway;
use crate::model::{Entry, EntryType, FileActivityAfter};
use crate::store::{EntryFilter, Store};

/// Re-examine every review-comment entry in `repo` against later commits on
/// its PR, writing `file_activity_after` back onto each. Returns the number
/// of entries updated.
///
/// When `gateway` is `None`, no commit-file resolver is available and every
/// later commit on the PR counts toward `commits_touching_file` — the
/// conservative fallback described in §4.5.
pub async fn check(store: &Store, gateway: Option<&GitHubGateway>, owner: &str, name: &str, repo: &str) -> Result<u64> {
    let entries = store.query_entries(&EntryFilter::for_repo(repo), None, None).await?;

    let mut by_pr: HashMap<u64, Vec<Entry>> = HashMap::new();
    for entry in entries {
        by_pr.entry(entry.pr).or_default().push(entry);
    }

    let mut commit_file_cache: HashMap<String, Option<Vec<String>>> = HashMap::new();
    let mut updated = 0u64;

    for pr_entries in by_pr.values() {
        let commits: Vec<&Entry> = pr_entries.iter().filter(|e| e.entry_type == EntryType::Commit).collect();

        for comment in pr_entries.iter().filter(|e| e.is_review_comment()) {
            let Some(file) = &comment.file else { continue };

            let mut later_commits: Vec<&Entry> =
                commits.iter().filter(|c| c.created_at > comment.created_at).copied().collect();
            later_commits.sort_by_key(|c| c.created_at);

            let mut touching = 0u32;
            let mut resolver_unavailable = false;
            let mut latest_commit = None;
            let mut latest_commit_at = None;

            for commit in &later_commits {
                let sha = &commit.id;
                let files = match gateway {
                    None => None,
                    Some(gateway) => {
                        if let Some(cached) = commit_file_cache.get(sha) {
                            cached.clone()
                        } else {
                            let fetched = gateway.get_commit_files(owner, name, sha).await.ok();
                            commit_file_cache.insert(sha.clone(), fetched.clone());
                            fetched
                        }
                    }
                };

                let counts = match files {
                    Some(files) => files.iter().any(|f| f == file),
                    None => {
                        resolver_unavailable = true;
                        true
                    }
                };

                if counts {
                    touching += 1;
                    latest_commit = Some(sha.clone());
                    latest_commit_at = Some(commit.created_at);
                }
            }

            let mut enriched = comment.clone();
            enriched.file_activity_after = Some(FileActivityAfter {
                modified: touching > 0,
                commits_touching_file: touching,
                latest_commit,
                latest_commit_at,
                resolver_unavailable,
            });
            store.update_entry(&enriched).await?;
            updated += 1;
        }
    }

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::model::PrState;

    fn commit(id: &str, pr: u64, created_at: chrono::DateTime<Utc>) -> Entry {
        Entry {
            id: id.into(),
            repo: "acme/widgets".into(),
            pr,
            entry_type: EntryType::Commit,
            subtype: None,
            author: "bob".into(),
            body: None,
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

    fn review_comment(id: &str, pr: u64, file: &str, created_at: chrono::DateTime<Utc>) -> Entry {
        Entry {
            id: id.into(),
            repo: "acme/widgets".into(),
            pr,
            entry_type: EntryType::Comment,
            subtype: Some("review_comment".into()),
            author: "alice".into(),
            body: Some("fix this".into()),
            state: None,
            file: Some(file.into()),
            line: Some(3),
            thread_id: Some("t1".into()),
            thread_resolved: Some(false),
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

    #[tokio::test]
    async fn no_resolver_counts_every_later_commit() {
        let store = Store::open_in_memory().await.unwrap();
        let now = Utc::now();
        let comment = review_comment("c1", 1, "src/lib.rs", now - Duration::hours(2));
        let commit_a = commit("sha1", 1, now - Duration::hours(1));
        let commit_b = commit("sha2", 1, now);
        store.insert_entries(&[comment, commit_a, commit_b]).await.unwrap();

        let updated = check(&store, None, "acme", "widgets", "acme/widgets").await.unwrap();
        assert_eq!(updated, 1);

        let entries = store
            .query_entries(&EntryFilter::for_repo("acme/widgets"), None, None)
            .await
            .unwrap();
        let comment = entries.iter().find(|e| e.id == "c1").unwrap();
        let activity = comment.file_activity_after.as_ref().unwrap();
        assert!(activity.modified);
        assert_eq!(activity.commits_touching_file, 2);
        assert!(activity.resolver_unavailable);
    }

    #[tokio::test]
    async fn earlier_commits_do_not_count() {
        let store = Store::open_in_memory().await.unwrap();
        let now = Utc::now();
        let earlier_commit = commit("sha0", 1, now - Duration::hours(3));
        let comment = review_comment("c1", 1, "src/lib.rs", now - Duration::hours(2));
        store.insert_entries(&[earlier_commit, comment]).await.unwrap();

        check(&store, None, "acme", "widgets", "acme/widgets").await.unwrap();

        let entries = store
            .query_entries(&EntryFilter::for_repo("acme/widgets"), None, None)
            .await
            .unwrap();
        let comment = entries.iter().find(|e| e.id == "c1").unwrap();
        let activity = comment.file_activity_after.as_ref().unwrap();
        assert!(!activity.modified);
        assert_eq!(activity.commits_touching_file, 0);
    }
}
