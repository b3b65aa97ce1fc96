//! The actionable summary: a bucketed view (unaddressed, changes-requested,
//! awaiting-review, stale) used for human-facing overviews, per §4.7.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::model::{Entry, EntryType, PrState, ReviewState};
use crate::store::{EntryFilter, Store};

/// Whose PRs the summary should bucket, per §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Perspective {
    /// PRs authored by the viewer.
    Mine,
    /// PRs the viewer is expected to review.
    Reviews,
    None,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionableBucket {
    pub repo: String,
    pub pr: u64,
    pub pr_title: String,
    pub last_activity_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ActionableSummary {
    pub unaddressed: Vec<ActionableBucket>,
    pub changes_requested: Vec<ActionableBucket>,
    pub awaiting_review: Vec<ActionableBucket>,
    pub stale: Vec<ActionableBucket>,
}

struct PrAggregate {
    repo: String,
    pr: u64,
    pr_title: String,
    pr_author: String,
    pr_state: PrState,
    last_activity_at: DateTime<Utc>,
    has_unaddressed_by_other: bool,
    latest_nonauthor_review: Option<(DateTime<Utc>, ReviewState)>,
    review_count: u32,
}

/// Build the actionable summary for `filter`, bucketing per `perspective`
/// relative to `viewer_login`. `stale_threshold` is the age past which an
/// open PR with no recent activity is considered stale.
pub async fn actionable_summary(
    store: &Store,
    filter: &EntryFilter,
    perspective: Perspective,
    viewer_login: Option<&str>,
    stale_threshold: Duration,
) -> Result<ActionableSummary> {
    let entries = store.query_entries(filter, None, None).await?;
    let acked_ids: HashSet<String> = store.get_acked_ids(filter.repo.as_deref()).await?.into_iter().collect();

    let mut by_pr: HashMap<(String, u64), Vec<Entry>> = HashMap::new();
    for entry in entries {
        by_pr.entry((entry.repo.clone(), entry.pr)).or_default().push(entry);
    }

    let now = Utc::now();
    let mut summary = ActionableSummary::default();

    for entries in by_pr.into_values() {
        let Some(agg) = build_aggregate(&entries, &acked_ids, viewer_login) else {
            continue;
        };

        let bucket = ActionableBucket {
            repo: agg.repo.clone(),
            pr: agg.pr,
            pr_title: agg.pr_title.clone(),
            last_activity_at: agg.last_activity_at,
        };

        if agg.has_unaddressed_by_other {
            summary.unaddressed.push(bucket.clone());
        }

        if let Some((_, state)) = agg.latest_nonauthor_review {
            if state == ReviewState::ChangesRequested {
                summary.changes_requested.push(bucket.clone());
            }
        }

        let wants_review = match perspective {
            Perspective::Mine => viewer_login.is_some_and(|v| v.eq_ignore_ascii_case(&agg.pr_author)),
            Perspective::Reviews => viewer_login.is_some_and(|v| !v.eq_ignore_ascii_case(&agg.pr_author)),
            Perspective::None => false,
        };
        if wants_review && agg.review_count == 0 {
            summary.awaiting_review.push(bucket.clone());
        }

        let is_stale = agg.pr_state == PrState::Open && now - agg.last_activity_at > stale_threshold;
        if is_stale {
            summary.stale.push(bucket);
        }
    }

    for bucket in [
        &mut summary.unaddressed,
        &mut summary.changes_requested,
        &mut summary.awaiting_review,
        &mut summary.stale,
    ] {
        bucket.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));
    }

    Ok(summary)
}

fn build_aggregate(entries: &[Entry], acked_ids: &HashSet<String>, viewer_login: Option<&str>) -> Option<PrAggregate> {
    let first = entries.first()?;
    let mut agg = PrAggregate {
        repo: first.repo.clone(),
        pr: first.pr,
        pr_title: first.pr_title.clone(),
        pr_author: first.pr_author.clone(),
        pr_state: first.pr_state,
        last_activity_at: first.created_at,
        has_unaddressed_by_other: false,
        latest_nonauthor_review: None,
        review_count: 0,
    };

    for entry in entries {
        agg.last_activity_at = agg.last_activity_at.max(entry.created_at);

        if entry.is_review_comment()
            && !entry.thread_resolved.unwrap_or(false)
            && !acked_ids.contains(&entry.id)
            && !viewer_login.is_some_and(|v| v.eq_ignore_ascii_case(&entry.author))
        {
            agg.has_unaddressed_by_other = true;
        }

        if entry.entry_type == EntryType::Review {
            agg.review_count += 1;
            if !entry.author.eq_ignore_ascii_case(&agg.pr_author) {
                if let Some(state) = entry.state {
                    let supersede = match agg.latest_nonauthor_review {
                        Some((at, _)) => entry.created_at >= at,
                        None => true,
                    };
                    if supersede {
                        agg.latest_nonauthor_review = Some((entry.created_at, state));
                    }
                }
            }
        }
    }

    // A later approval supersedes an earlier changes-requested.
    if let Some((_, ReviewState::ChangesRequested)) = agg.latest_nonauthor_review {
        let approved_after = entries.iter().any(|e| {
            e.entry_type == EntryType::Review
                && !e.author.eq_ignore_ascii_case(&agg.pr_author)
                && e.state == Some(ReviewState::Approved)
                && e.created_at >= agg.latest_nonauthor_review.map(|(at, _)| at).unwrap_or(e.created_at)
        });
        if approved_after {
            agg.latest_nonauthor_review = None;
        }
    }

    Some(agg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entry, EntryType, PrState, ReviewState};

    fn sample(pr: u64, entry_type: EntryType, created_at: DateTime<Utc>, author: &str) -> Entry {
        Entry {
            id: format!("id-{pr}-{created_at}-{author}"),
            repo: "acme/widgets".into(),
            pr,
            entry_type,
            subtype: None,
            author: author.into(),
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

    #[test]
    fn changes_requested_not_superseded_by_earlier_approval() {
        let now = Utc::now();
        let mut review1 = sample(1, EntryType::Review, now - Duration::hours(2), "alice");
        review1.state = Some(ReviewState::Approved);
        let mut review2 = sample(1, EntryType::Review, now, "alice");
        review2.state = Some(ReviewState::ChangesRequested);

        let agg = build_aggregate(&[review1, review2], &HashSet::new(), None).unwrap();
        assert_eq!(agg.latest_nonauthor_review.map(|(_, s)| s), Some(ReviewState::ChangesRequested));
    }

    #[test]
    fn changes_requested_superseded_by_later_approval() {
        let now = Utc::now();
        let mut review1 = sample(1, EntryType::Review, now - Duration::hours(2), "alice");
        review1.state = Some(ReviewState::ChangesRequested);
        let mut review2 = sample(1, EntryType::Review, now, "alice");
        review2.state = Some(ReviewState::Approved);

        let agg = build_aggregate(&[review1, review2], &HashSet::new(), None).unwrap();
        assert!(agg.latest_nonauthor_review.is_none());
    }

    #[test]
    fn unaddressed_ignores_viewers_own_comments() {
        let now = Utc::now();
        let mut comment = sample(1, EntryType::Comment, now, "viewer");
        comment.subtype = Some("review_comment".into());
        comment.thread_resolved = Some(false);

        let agg = build_aggregate(&[comment], &HashSet::new(), Some("viewer")).unwrap();
        assert!(!agg.has_unaddressed_by_other);
    }
}
