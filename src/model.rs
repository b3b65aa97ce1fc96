//! Core domain types shared by the store, sync engine, query engine,
//! aggregation layer, and feedback bridge.
//!
//! Entries are modeled as a tagged record with optional enrichment blocks
//! rather than a loose JSON map — the wire form (§6 of the spec) remains
//! JSON via `serde`, but internally every field is typed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Comment,
    Review,
    Commit,
    Ci,
    Event,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrState {
    Open,
    Closed,
    Merged,
    Draft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Pending,
    Dismissed,
}

/// The open-set vs closed-set partition of PRs sync operates on. Each scope
/// has an independent cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Open,
    Closed,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Open => "open",
            Scope::Closed => "closed",
        }
    }

    /// GraphQL PR states this scope covers.
    pub fn pr_states(self) -> &'static [&'static str] {
        match self {
            Scope::Open => &["OPEN"],
            Scope::Closed => &["CLOSED", "MERGED"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreezeKind {
    Pr,
    Thread,
}

// ---------------------------------------------------------------------------
// Enrichment blocks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphiteContext {
    pub stack_id: String,
    pub stack_position: u32,
    pub stack_size: u32,
    #[serde(default)]
    pub parent_pr: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileProvenance {
    pub origin_pr: u64,
    pub origin_branch: String,
    pub origin_commit: String,
    pub stack_position: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileActivityAfter {
    pub modified: bool,
    pub commits_touching_file: u32,
    pub latest_commit: Option<String>,
    pub latest_commit_at: Option<DateTime<Utc>>,
    /// Set when the file-set resolver was unavailable and the count falls
    /// back to "every later commit on the PR" — a conservative upper bound,
    /// per the staleness-check design note.
    #[serde(default)]
    pub resolver_unavailable: bool,
}

// ---------------------------------------------------------------------------
// Entry — one immutable event in a PR's life
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub repo: String,
    pub pr: u64,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    #[serde(default)]
    pub subtype: Option<String>,
    pub author: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub state: Option<ReviewState>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub thread_resolved: Option<bool>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub url: Option<String>,

    // Denormalized PR context, copied onto every entry.
    pub pr_title: String,
    pub pr_state: PrState,
    pub pr_author: String,
    pub pr_branch: String,
    #[serde(default)]
    pub pr_labels: Option<Vec<String>>,

    // Optional enrichment blocks.
    #[serde(default)]
    pub graphite: Option<GraphiteContext>,
    #[serde(default)]
    pub file_provenance: Option<FileProvenance>,
    #[serde(default)]
    pub file_activity_after: Option<FileActivityAfter>,
}

impl Entry {
    /// Short-id cache target for this entry.
    pub fn short_id_target(&self) -> crate::identity::ShortIdTarget {
        crate::identity::ShortIdTarget {
            full_id: self.id.clone(),
            repo: self.repo.clone(),
            pr: self.pr,
        }
    }

    pub fn is_review_comment(&self) -> bool {
        self.subtype.as_deref() == Some("review_comment")
    }

    pub fn is_issue_comment(&self) -> bool {
        self.subtype.as_deref() == Some("issue_comment")
    }

    /// An entry is orphaned if it's an unresolved review comment on a PR
    /// that's already closed or merged (§4.6).
    pub fn is_orphaned(&self) -> bool {
        self.is_review_comment()
            && !self.thread_resolved.unwrap_or(false)
            && matches!(self.pr_state, PrState::Closed | PrState::Merged)
    }
}

/// The wire form adds synthesized display fields not present on the stored
/// row: the short-form `id` (`"[@xxxxx]"`) and the full-form `gh_id`.
#[derive(Debug, Clone, Serialize)]
pub struct EntryWire {
    pub id: String,
    pub gh_id: String,
    #[serde(flatten)]
    pub entry: Entry,
}

impl EntryWire {
    pub fn new(entry: Entry, short_id: &str) -> Self {
        Self {
            id: crate::identity::format_display_id(short_id),
            gh_id: entry.id.clone(),
            entry,
        }
    }
}

// ---------------------------------------------------------------------------
// PR metadata — mutable summary row
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrMeta {
    pub repo: String,
    pub number: u64,
    pub state: PrState,
    pub is_draft: bool,
    pub title: String,
    pub author: String,
    pub branch: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

// ---------------------------------------------------------------------------
// SyncMeta
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncMeta {
    pub repo: String,
    pub scope: Scope,
    pub last_sync: DateTime<Utc>,
    #[serde(default)]
    pub cursor: Option<String>,
    pub pr_count: u64,
}

// ---------------------------------------------------------------------------
// Ack
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub repo: String,
    pub comment_id: String,
    pub pr: u64,
    pub acked_at: DateTime<Utc>,
    #[serde(default)]
    pub acked_by: Option<String>,
    pub reaction_added: bool,
}

// ---------------------------------------------------------------------------
// Freeze
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Freeze {
    pub repo: String,
    pub pr: u64,
    pub kind: FreezeKind,
    pub target_id: String,
    pub frozen_at: DateTime<Utc>,
}

/// Parse `owner/name` into its two parts.
pub fn split_repo(repo: &str) -> Option<(&str, &str)> {
    repo.split_once('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> Entry {
        Entry {
            id: "abc".into(),
            repo: "acme/widgets".into(),
            pr: 1,
            entry_type: EntryType::Comment,
            subtype: Some("review_comment".into()),
            author: "alice".into(),
            body: Some("looks good".into()),
            state: None,
            file: Some("src/lib.rs".into()),
            line: Some(10),
            thread_id: Some("thread1".into()),
            thread_resolved: Some(false),
            created_at: Utc::now(),
            updated_at: None,
            captured_at: Utc::now(),
            url: None,
            pr_title: "Add feature".into(),
            pr_state: PrState::Merged,
            pr_author: "bob".into(),
            pr_branch: "feature".into(),
            pr_labels: None,
            graphite: None,
            file_provenance: None,
            file_activity_after: None,
        }
    }

    #[test]
    fn orphaned_requires_unresolved_and_closed_state() {
        let mut e = sample_entry();
        assert!(e.is_orphaned());
        e.thread_resolved = Some(true);
        assert!(!e.is_orphaned());
        e.thread_resolved = Some(false);
        e.pr_state = PrState::Open;
        assert!(!e.is_orphaned());
    }

    #[test]
    fn split_repo_parses_owner_and_name() {
        assert_eq!(split_repo("acme/widgets"), Some(("acme", "widgets")));
        assert_eq!(split_repo("nope"), None);
    }
}
