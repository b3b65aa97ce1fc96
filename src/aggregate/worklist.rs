//! Per-PR rollup of entries into a worklist, §4.7.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::model::{Entry, EntryType, GraphiteContext, PrState, ReviewState};
use crate::store::{EntryFilter, Store};

#[derive(Debug, Clone, Default, Serialize)]
pub struct EntryCounts {
    pub comments: u32,
    pub reviews: u32,
    pub commits: u32,
    pub ci: u32,
    pub events: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReviewStateCounts {
    pub approved: u32,
    pub changes_requested: u32,
    pub commented: u32,
    pub pending: u32,
    pub dismissed: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorklistItem {
    pub repo: String,
    pub pr: u64,
    pub pr_title: String,
    pub pr_state: PrState,
    pub pr_author: String,
    pub last_activity_at: DateTime<Utc>,
    pub counts: EntryCounts,
    pub review_states: ReviewStateCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graphite: Option<GraphiteContext>,
    pub unaddressed_feedback: u32,
}

/// Build the worklist for everything `filter` selects, sorted
/// `changes_requested DESC, unaddressed DESC, last_activity_at DESC`.
pub async fn worklist(store: &Store, filter: &EntryFilter) -> Result<Vec<WorklistItem>> {
    let entries = store.query_entries(filter, None, None).await?;
    let acked_ids: HashSet<String> = store.get_acked_ids(filter.repo.as_deref()).await?.into_iter().collect();

    let mut by_pr: HashMap<(String, u64), Vec<Entry>> = HashMap::new();
    for entry in entries {
        by_pr.entry((entry.repo.clone(), entry.pr)).or_default().push(entry);
    }

    let mut items: Vec<WorklistItem> = by_pr
        .into_values()
        .map(|entries| build_item(&entries, &acked_ids))
        .collect();

    items.sort_by(|a, b| {
        b.review_states
            .changes_requested
            .cmp(&a.review_states.changes_requested)
            .then(b.unaddressed_feedback.cmp(&a.unaddressed_feedback))
            .then(b.last_activity_at.cmp(&a.last_activity_at))
    });

    Ok(items)
}

fn build_item(entries: &[Entry], acked_ids: &HashSet<String>) -> WorklistItem {
    let first = &entries[0];
    let mut counts = EntryCounts::default();
    let mut review_states = ReviewStateCounts::default();
    let mut last_activity_at = first.created_at;
    let mut unaddressed_threads: HashSet<String> = HashSet::new();
    let mut graphite = None;

    for entry in entries {
        last_activity_at = last_activity_at.max(entry.created_at);
        if graphite.is_none() {
            graphite = entry.graphite.clone();
        }

        match entry.entry_type {
            EntryType::Comment => counts.comments += 1,
            EntryType::Review => {
                counts.reviews += 1;
                match entry.state {
                    Some(ReviewState::Approved) => review_states.approved += 1,
                    Some(ReviewState::ChangesRequested) => review_states.changes_requested += 1,
                    Some(ReviewState::Commented) => review_states.commented += 1,
                    Some(ReviewState::Pending) => review_states.pending += 1,
                    Some(ReviewState::Dismissed) => review_states.dismissed += 1,
                    None => {}
                }
            }
            EntryType::Commit => counts.commits += 1,
            EntryType::Ci => counts.ci += 1,
            EntryType::Event => counts.events += 1,
        }

        if entry.is_review_comment()
            && !entry.thread_resolved.unwrap_or(false)
            && !acked_ids.contains(&entry.id)
        {
            if let Some(thread_id) = &entry.thread_id {
                unaddressed_threads.insert(thread_id.clone());
            }
        }
    }

    WorklistItem {
        repo: first.repo.clone(),
        pr: first.pr,
        pr_title: first.pr_title.clone(),
        pr_state: first.pr_state,
        pr_author: first.pr_author.clone(),
        last_activity_at,
        counts,
        review_states,
        graphite,
        unaddressed_feedback: unaddressed_threads.len() as u32,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn sample_entry(pr: u64, entry_type: EntryType, created_at: DateTime<Utc>) -> Entry {
        Entry {
            id: format!("id-{pr}-{created_at}"),
            repo: "acme/widgets".into(),
            pr,
            entry_type,
            subtype: None,
            author: "alice".into(),
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
            pr_title: "Add feature".into(),
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
    fn unaddressed_feedback_counts_distinct_unresolved_unacked_threads() {
        let now = Utc::now();
        let mut comment_a = sample_entry(1, EntryType::Comment, now);
        comment_a.subtype = Some("review_comment".into());
        comment_a.thread_id = Some("t1".into());
        comment_a.thread_resolved = Some(false);
        comment_a.id = "c1".into();

        let mut comment_b = sample_entry(1, EntryType::Comment, now - Duration::minutes(1));
        comment_b.subtype = Some("review_comment".into());
        comment_b.thread_id = Some("t1".into());
        comment_b.thread_resolved = Some(false);
        comment_b.id = "c2".into();

        let item = build_item(&[comment_a, comment_b], &HashSet::new());
        assert_eq!(item.unaddressed_feedback, 1, "same thread counted once");
    }

    #[test]
    fn acked_comment_does_not_count_as_unaddressed() {
        let now = Utc::now();
        let mut comment = sample_entry(1, EntryType::Comment, now);
        comment.subtype = Some("review_comment".into());
        comment.thread_id = Some("t1".into());
        comment.thread_resolved = Some(false);
        comment.id = "c1".into();

        let acked: HashSet<String> = ["c1".to_owned()].into_iter().collect();
        let item = build_item(&[comment], &acked);
        assert_eq!(item.unaddressed_feedback, 0);
    }
}
