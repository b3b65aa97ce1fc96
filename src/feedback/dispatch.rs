//! Steps 2-3 of the feedback bridge: classify the resolved target and
//! dispatch the requested mutation through the gateway, per §4.9.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::{FirewatchError, Result};
use crate::feedback::action::{ActionOutcome, EditRequest, FeedbackAction};
use crate::feedback::resolve::ResolvedTarget;
use crate::github::GitHubGateway;
use crate::model::{Ack, Entry, split_repo};
use crate::store::Store;

/// Serializes mutations against a single review thread, so a `close`
/// racing a `reply` on the same thread can't resolve before the reply
/// lands (§4.9 step 4, §5's ordering rule).
#[derive(Clone, Default)]
pub struct ThreadLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl ThreadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lock_for(&self, thread_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(thread_id.to_owned()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}

/// Dispatch `action` against `target`. `acked_by` is the local username
/// recorded on an `Ack` row, if known.
pub async fn dispatch(
    store: &Store,
    gateway: Option<&GitHubGateway>,
    thread_locks: &ThreadLocks,
    target: &ResolvedTarget,
    action: &FeedbackAction,
    acked_by: Option<&str>,
) -> ActionOutcome {
    let mut outcome = match action {
        FeedbackAction::Ack => dispatch_ack(store, gateway, target, acked_by).await,
        FeedbackAction::Reply { body, resolve } => dispatch_reply(store, gateway, thread_locks, target, body, *resolve).await,
        FeedbackAction::Close { all } => dispatch_close(store, gateway, thread_locks, target, *all).await,
        FeedbackAction::Approve { body } => dispatch_review(gateway, target, "APPROVE", body.as_deref()).await,
        FeedbackAction::Reject { body } => {
            if body.trim().is_empty() {
                Err(FirewatchError::Validation("reject requires a non-empty body".to_owned()))
            } else {
                dispatch_review(gateway, target, "REQUEST_CHANGES", Some(body)).await
            }
        }
        FeedbackAction::Edit(edit) => dispatch_edit(gateway, target, edit).await,
    };

    match &mut outcome {
        Ok(outcome) => {
            outcome.pr = Some(target.pr());
            if let ResolvedTarget::Entry(entry) = target {
                outcome.gh_id = Some(entry.id.clone());
                outcome.short_id = Some(crate::identity::generate_short_id(&entry.id, &entry.repo));
            }
        }
        Err(_) => {}
    }

    match outcome {
        Ok(outcome) => outcome,
        Err(err) => classify_error_outcome(target, err),
    }
}

fn classify_error_outcome(target: &ResolvedTarget, err: FirewatchError) -> ActionOutcome {
    // "already-acked"/"already-resolved" are surfaced as success-with-flag
    // rather than failure, per §7's Conflict policy.
    if let FirewatchError::Conflict(_) = &err {
        let mut outcome = ActionOutcome::success(target.dedup_key());
        outcome.warning = Some(err.to_string());
        outcome.pr = Some(target.pr());
        if let ResolvedTarget::Entry(entry) = target {
            outcome.gh_id = Some(entry.id.clone());
        }
        return outcome;
    }
    ActionOutcome::error(target.dedup_key(), err.to_string())
}

fn owner_name(repo: &str) -> Result<(&str, &str)> {
    split_repo(repo).ok_or_else(|| FirewatchError::Validation(format!("invalid repo slug: {repo}")))
}

async fn dispatch_ack(
    store: &Store,
    gateway: Option<&GitHubGateway>,
    target: &ResolvedTarget,
    acked_by: Option<&str>,
) -> Result<ActionOutcome> {
    let ResolvedTarget::Entry(entry) = target else {
        return Err(FirewatchError::Validation("ack requires a comment, not a bare PR number".to_owned()));
    };

    let already_acked = store.is_acked(&entry.repo, &entry.id).await?;

    let mut reaction_added = false;
    let mut warning = None;
    match gateway {
        Some(gateway) => match gateway.add_reaction(&entry.id, "THUMBS_UP").await {
            Ok(()) => reaction_added = true,
            Err(_) => warning = Some("reaction failed; ack recorded locally".to_owned()),
        },
        None => warning = Some("no token; ack recorded locally only".to_owned()),
    }

    store
        .add_ack(&Ack {
            repo: entry.repo.clone(),
            comment_id: entry.id.clone(),
            pr: entry.pr,
            acked_at: Utc::now(),
            acked_by: acked_by.map(str::to_owned),
            reaction_added,
        })
        .await?;

    let mut outcome = ActionOutcome::success(entry.id.clone());
    outcome.reaction_added = Some(reaction_added);
    outcome.already_acked = Some(already_acked);
    outcome.warning = warning;
    Ok(outcome)
}

async fn dispatch_reply(
    store: &Store,
    gateway: Option<&GitHubGateway>,
    thread_locks: &ThreadLocks,
    target: &ResolvedTarget,
    body: &str,
    resolve_after: bool,
) -> Result<ActionOutcome> {
    let gateway = gateway.ok_or_else(|| FirewatchError::Auth("no GitHub token available".to_owned()))?;
    let (owner, name) = owner_name(target.repo())?;

    match target {
        ResolvedTarget::Entry(entry) if entry.is_review_comment() => {
            let thread_id = canonical_thread_id(gateway, owner, name, entry).await?;
            let _lock = thread_locks.lock_for(&thread_id).await.lock_owned().await;

            gateway.add_review_thread_reply(&thread_id, body).await?;
            let mut resolved = None;
            if resolve_after {
                gateway.resolve_review_thread(&thread_id).await?;
                resolved = Some(true);
            }
            let mut outcome = ActionOutcome::success(entry.id.clone());
            outcome.resolved = resolved;
            Ok(outcome)
        }
        _ => {
            let pr_id = gateway.fetch_pull_request_id(owner, name, target.pr()).await?;
            // `in_reply_to` is an informational annotation on the returned
            // payload, not a GraphQL field — issue comments have no native
            // threading, so the reply is a new top-level comment.
            gateway.add_issue_comment(&pr_id, body).await?;
            let mut outcome = ActionOutcome::success(target.dedup_key());
            if let ResolvedTarget::Entry(entry) = target {
                outcome.short_id = Some(crate::identity::generate_short_id(&entry.id, &entry.repo));
            }
            Ok(outcome)
        }
    }
}

/// Re-resolve a review comment's thread id via the gateway's canonical
/// thread map, falling back to the entry's cached `thread_id` if the
/// comment isn't present in the map (e.g. it has since been deleted
/// upstream but our cache is still warm).
async fn canonical_thread_id(gateway: &GitHubGateway, owner: &str, name: &str, entry: &Entry) -> Result<String> {
    let map = gateway.fetch_review_thread_map(owner, name, entry.pr).await?;
    if let Some(thread_id) = map.get(&entry.id) {
        return Ok(thread_id.clone());
    }
    entry
        .thread_id
        .clone()
        .ok_or_else(|| FirewatchError::NotFound(format!("no thread found for comment {}", entry.id)))
}

async fn dispatch_close(
    store: &Store,
    gateway: Option<&GitHubGateway>,
    thread_locks: &ThreadLocks,
    target: &ResolvedTarget,
    all: bool,
) -> Result<ActionOutcome> {
    let gateway = gateway.ok_or_else(|| FirewatchError::Auth("no GitHub token available".to_owned()))?;
    let (owner, name) = owner_name(target.repo())?;

    match target {
        ResolvedTarget::Entry(entry) if entry.is_review_comment() => {
            let thread_id = canonical_thread_id(gateway, owner, name, entry).await?;
            resolve_one_thread(gateway, thread_locks, &thread_id).await?;
            let mut outcome = ActionOutcome::success(entry.id.clone());
            outcome.resolved = Some(true);
            Ok(outcome)
        }
        ResolvedTarget::Entry(_) => {
            Err(FirewatchError::Validation("close/resolve only applies to review-comment threads".to_owned()))
        }
        ResolvedTarget::Pr { repo, pr } => {
            if !all {
                return Err(FirewatchError::Validation(
                    "resolving every thread on a PR requires --all".to_owned(),
                ));
            }
            let thread_ids = unresolved_thread_ids(store, repo, *pr).await?;
            for thread_id in &thread_ids {
                resolve_one_thread(gateway, thread_locks, thread_id).await?;
            }
            let mut outcome = ActionOutcome::success(format!("pr:{repo}#{pr}"));
            outcome.resolved = Some(true);
            Ok(outcome)
        }
    }
}

async fn resolve_one_thread(gateway: &GitHubGateway, thread_locks: &ThreadLocks, thread_id: &str) -> Result<()> {
    let _lock = thread_locks.lock_for(thread_id).await.lock_owned().await;
    gateway.resolve_review_thread(thread_id).await?;
    Ok(())
}

async fn unresolved_thread_ids(store: &Store, repo: &str, pr: u64) -> Result<Vec<String>> {
    use crate::store::{EntryFilter, PrSelector};

    let filter = EntryFilter {
        repo: Some(repo.to_owned()),
        exact_repo: true,
        pr: Some(PrSelector::Single(pr)),
        ..Default::default()
    };
    let entries = store.query_entries(&filter, None, None).await?;
    let mut seen = std::collections::HashSet::new();
    let mut ids = Vec::new();
    for entry in entries {
        if entry.is_review_comment() && !entry.thread_resolved.unwrap_or(false) {
            if let Some(thread_id) = entry.thread_id {
                if seen.insert(thread_id.clone()) {
                    ids.push(thread_id);
                }
            }
        }
    }
    Ok(ids)
}

async fn dispatch_review(
    gateway: Option<&GitHubGateway>,
    target: &ResolvedTarget,
    event: &str,
    body: Option<&str>,
) -> Result<ActionOutcome> {
    let gateway = gateway.ok_or_else(|| FirewatchError::Auth("no GitHub token available".to_owned()))?;
    let (owner, name) = owner_name(target.repo())?;
    let pr_id = gateway.fetch_pull_request_id(owner, name, target.pr()).await?;
    gateway.submit_review(&pr_id, event, body).await?;
    Ok(ActionOutcome::success(target.dedup_key()))
}

async fn dispatch_edit(
    gateway: Option<&GitHubGateway>,
    target: &ResolvedTarget,
    edit: &EditRequest,
) -> Result<ActionOutcome> {
    let gateway = gateway.ok_or_else(|| FirewatchError::Auth("no GitHub token available".to_owned()))?;
    let (owner, name) = owner_name(target.repo())?;
    let number = target.pr();

    let mut errors = Vec::new();

    if edit.title.is_some() || edit.body.is_some() || edit.base.is_some() {
        if let Err(e) = gateway
            .edit_pull_request(owner, name, number, edit.title.as_deref(), edit.body.as_deref(), edit.base.as_deref())
            .await
        {
            errors.push(format!("title/body/base: {e}"));
        }
    }

    if let Some(draft) = edit.draft {
        let pr_id = match gateway.fetch_pull_request_id(owner, name, number).await {
            Ok(id) => Some(id),
            Err(e) => {
                errors.push(format!("draft toggle: {e}"));
                None
            }
        };
        if let Some(pr_id) = pr_id {
            if let Err(e) = gateway.set_draft(&pr_id, draft).await {
                errors.push(format!("draft toggle: {e}"));
            }
        }
    }

    if !edit.add_labels.is_empty() || !edit.remove_labels.is_empty() {
        if let Err(e) = gateway.set_labels(owner, name, number, &edit.add_labels, &edit.remove_labels).await {
            errors.push(format!("labels: {e}"));
        }
    }

    if !edit.add_reviewers.is_empty() || !edit.remove_reviewers.is_empty() {
        if let Err(e) = gateway.set_reviewers(owner, name, number, &edit.add_reviewers, &edit.remove_reviewers).await {
            errors.push(format!("reviewers: {e}"));
        }
    }

    if !edit.add_assignees.is_empty() || !edit.remove_assignees.is_empty() {
        if let Err(e) = gateway.set_assignees(owner, name, number, &edit.add_assignees, &edit.remove_assignees).await {
            errors.push(format!("assignees: {e}"));
        }
    }

    if let Some(milestone) = edit.milestone {
        if let Err(e) = gateway.set_milestone(owner, name, number, milestone).await {
            errors.push(format!("milestone: {e}"));
        }
    }

    if errors.is_empty() {
        Ok(ActionOutcome::success(target.dedup_key()))
    } else {
        let mut outcome = ActionOutcome::error(target.dedup_key(), errors.join("; "));
        // Sub-edits that succeeded were already applied upstream; the
        // outcome still reports failure overall so the caller investigates,
        // per §4.9 step 3's "errors collected and reported per sub-edit".
        outcome.pr = Some(number);
        Ok(outcome)
    }
}
