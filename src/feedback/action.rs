//! The action vocabulary the feedback bridge dispatches, per §4.9 step 3.

use serde::Serialize;

/// One user-requested action against a resolved target.
#[derive(Debug, Clone)]
pub enum FeedbackAction {
    /// Idempotent local acknowledgement, optionally mirrored as a reaction.
    Ack,
    /// Reply to a thread (review comment) or add an issue comment (PR /
    /// top-level comment), optionally resolving the thread afterward.
    Reply { body: String, resolve: bool },
    /// Resolve one or more review threads. `all` is required when the
    /// target is a bare PR number, per §4.9 step 3.
    Close { all: bool },
    /// Submit an `APPROVE` review.
    Approve { body: Option<String> },
    /// Submit a `REQUEST_CHANGES` review. `body` is required.
    Reject { body: String },
    /// Orchestrate independent PR field/label/reviewer/assignee/milestone
    /// edits.
    Edit(EditRequest),
}

/// Each field here is an independent sub-edit dispatched as its own
/// mutation; a failure in one does not prevent the others from running
/// (§4.9 step 3's "edit" contract).
#[derive(Debug, Clone, Default)]
pub struct EditRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    pub base: Option<String>,
    pub draft: Option<bool>,
    /// `Some(None)` clears the milestone; `Some(Some(n))` sets it.
    pub milestone: Option<Option<u64>>,
    pub add_labels: Vec<String>,
    pub remove_labels: Vec<String>,
    pub add_reviewers: Vec<String>,
    pub remove_reviewers: Vec<String>,
    pub add_assignees: Vec<String>,
    pub remove_assignees: Vec<String>,
}

/// Per-ID outcome returned by dispatch and batch, per §4.9 step 4.
#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome {
    pub ok: bool,
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gh_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reaction_added: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub already_acked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionOutcome {
    pub fn error(input: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            input: input.into(),
            short_id: None,
            gh_id: None,
            pr: None,
            reaction_added: None,
            already_acked: None,
            resolved: None,
            warning: None,
            error: Some(error.into()),
        }
    }

    pub fn success(input: impl Into<String>) -> Self {
        Self {
            ok: true,
            input: input.into(),
            short_id: None,
            gh_id: None,
            pr: None,
            reaction_added: None,
            already_acked: None,
            resolved: None,
            warning: None,
            error: None,
        }
    }
}
