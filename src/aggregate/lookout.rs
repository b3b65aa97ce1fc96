//! The lookout digest: a periodic "what happened since I last checked"
//! summary, per §4.7. The window defaults to 7 days when no prior lookout
//! timestamp exists, or on an explicit reset.
//!
//! Open question (§9a of the design notes): whether "since the last
//! lookout" should bound every field, including the backlog-style ones
//! (`attention.stale`, `unaddressed_feedback`). We treat `counts` and
//! `attention.changes_requested`/`unreviewed` as windowed (new activity
//! since the period start) but `attention.stale` and `unaddressed_feedback`
//! as current-state snapshots — a PR doesn't stop being stale just because
//! nothing happened on it this week, and unaddressed feedback is a backlog,
//! not an event count.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::aggregate::actionable::{self, Perspective};
use crate::aggregate::worklist::EntryCounts;
use crate::error::Result;
use crate::model::{Entry, EntryType, ReviewState};
use crate::store::{EntryFilter, Store};

const DEFAULT_WINDOW: Duration = Duration::days(7);

#[derive(Debug, Clone, Default, Serialize)]
pub struct LookoutAttention {
    pub changes_requested: u32,
    pub unreviewed: u32,
    pub stale: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct LookoutSummary {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub counts: EntryCounts,
    pub attention: LookoutAttention,
    pub unaddressed_feedback: u32,
}

/// Produce the lookout summary for `filter`, then atomically advance the
/// stored lookout timestamp to `now`. On `reset`, the window anchors at
/// `DEFAULT_WINDOW` before `now` regardless of any prior stored timestamp.
pub async fn lookout(
    store: &Store,
    filter: &EntryFilter,
    reset: bool,
    stale_threshold: Duration,
) -> Result<LookoutSummary> {
    let now = Utc::now();
    let period_start = if reset {
        now - DEFAULT_WINDOW
    } else {
        store.get_lookout_last_run().await?.unwrap_or(now - DEFAULT_WINDOW)
    };

    let mut windowed_filter = filter.clone();
    windowed_filter.since = Some(period_start);
    let windowed_entries = store.query_entries(&windowed_filter, None, None).await?;

    let counts = tally_counts(&windowed_entries);

    let mut by_pr_review_states: HashMap<(String, u64), Vec<Option<ReviewState>>> = HashMap::new();
    for entry in &windowed_entries {
        if entry.entry_type == EntryType::Review {
            by_pr_review_states
                .entry((entry.repo.clone(), entry.pr))
                .or_default()
                .push(entry.state);
        }
    }
    let changes_requested = by_pr_review_states
        .values()
        .filter(|states| states.iter().any(|s| *s == Some(ReviewState::ChangesRequested)))
        .count() as u32;

    let active_prs: HashSet<(String, u64)> =
        windowed_entries.iter().map(|e| (e.repo.clone(), e.pr)).collect();
    let unreviewed = active_prs
        .iter()
        .filter(|key| !by_pr_review_states.contains_key(*key))
        .count() as u32;

    let summary = actionable::actionable_summary(store, filter, Perspective::None, None, stale_threshold).await?;
    let stale = summary.stale.len() as u32;

    let acked_ids: HashSet<String> = store.get_acked_ids(filter.repo.as_deref()).await?.into_iter().collect();
    let all_entries = store.query_entries(filter, None, None).await?;
    let unaddressed_feedback = count_unaddressed(&all_entries, &acked_ids);

    store.set_lookout_last_run(now).await?;

    Ok(LookoutSummary {
        period_start,
        period_end: now,
        counts,
        attention: LookoutAttention {
            changes_requested,
            unreviewed,
            stale,
        },
        unaddressed_feedback,
    })
}

fn tally_counts(entries: &[Entry]) -> EntryCounts {
    let mut counts = EntryCounts::default();
    for entry in entries {
        match entry.entry_type {
            EntryType::Comment => counts.comments += 1,
            EntryType::Review => counts.reviews += 1,
            EntryType::Commit => counts.commits += 1,
            EntryType::Ci => counts.ci += 1,
            EntryType::Event => counts.events += 1,
        }
    }
    counts
}

fn count_unaddressed(entries: &[Entry], acked_ids: &HashSet<String>) -> u32 {
    let mut threads: HashSet<&str> = HashSet::new();
    for entry in entries {
        if entry.is_review_comment()
            && !entry.thread_resolved.unwrap_or(false)
            && !acked_ids.contains(&entry.id)
        {
            if let Some(thread_id) = &entry.thread_id {
                threads.insert(thread_id.as_str());
            }
        }
    }
    threads.len() as u32
}
