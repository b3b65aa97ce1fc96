use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::model::{
    Ack, Entry, EntryType, FileActivityAfter, FileProvenance, Freeze, FreezeKind, GraphiteContext,
    PrState, ReviewState, SyncMeta,
};
use crate::store::error::{DbError, DbResult};

pub const INSERT_ENTRY_SQL: &str = r"
INSERT INTO entries (
    repo, id, pr, type, subtype, author, body, state, file, line,
    thread_id, thread_resolved, created_at, updated_at, captured_at, url,
    pr_title, pr_state, pr_author, pr_branch, pr_labels,
    graphite, file_provenance, file_activity_after
) VALUES (
    ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
    ?, ?, ?, ?, ?, ?,
    ?, ?, ?, ?, ?,
    ?, ?, ?
)
ON CONFLICT (repo, id) DO UPDATE SET
    updated_at = excluded.updated_at,
    thread_resolved = excluded.thread_resolved,
    pr_state = excluded.pr_state,
    pr_title = excluded.pr_title,
    pr_labels = excluded.pr_labels,
    graphite = COALESCE(excluded.graphite, graphite),
    file_provenance = COALESCE(excluded.file_provenance, file_provenance),
    file_activity_after = COALESCE(excluded.file_activity_after, file_activity_after)
";

fn entry_type_str(t: EntryType) -> &'static str {
    crate::store::entry_type_str(t)
}

fn pr_state_str(s: PrState) -> &'static str {
    crate::store::pr_state_str(s)
}

fn review_state_str(s: ReviewState) -> &'static str {
    match s {
        ReviewState::Approved => "approved",
        ReviewState::ChangesRequested => "changes_requested",
        ReviewState::Commented => "commented",
        ReviewState::Pending => "pending",
        ReviewState::Dismissed => "dismissed",
    }
}

fn parse_review_state(s: &str) -> Option<ReviewState> {
    Some(match s {
        "approved" => ReviewState::Approved,
        "changes_requested" => ReviewState::ChangesRequested,
        "commented" => ReviewState::Commented,
        "pending" => ReviewState::Pending,
        "dismissed" => ReviewState::Dismissed,
        _ => return None,
    })
}

fn parse_entry_type(s: &str) -> Option<EntryType> {
    Some(match s {
        "comment" => EntryType::Comment,
        "review" => EntryType::Review,
        "commit" => EntryType::Commit,
        "ci" => EntryType::Ci,
        "event" => EntryType::Event,
        _ => return None,
    })
}

fn parse_pr_state(s: &str) -> Option<PrState> {
    Some(match s {
        "open" => PrState::Open,
        "closed" => PrState::Closed,
        "merged" => PrState::Merged,
        "draft" => PrState::Draft,
        _ => return None,
    })
}

/// Bind an entry's fields as a plain tuple-like struct so the insert site
/// can chain `.bind()` calls inline (the borrow-checker wants the `Query`
/// built and executed in one expression, so this helper just pre-computes
/// the owned/serialized values rather than returning a half-built query).
pub struct EntryParams {
    pub repo: String,
    pub id: String,
    pub pr: i64,
    pub entry_type: &'static str,
    pub subtype: Option<String>,
    pub author: String,
    pub body: Option<String>,
    pub state: Option<&'static str>,
    pub file: Option<String>,
    pub line: Option<i64>,
    pub thread_id: Option<String>,
    pub thread_resolved: Option<bool>,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub captured_at: String,
    pub url: Option<String>,
    pub pr_title: String,
    pub pr_state: &'static str,
    pub pr_author: String,
    pub pr_branch: String,
    pub pr_labels: Option<String>,
    pub graphite: Option<String>,
    pub file_provenance: Option<String>,
    pub file_activity_after: Option<String>,
}

impl EntryParams {
    pub fn from_entry(entry: &Entry) -> DbResult<Self> {
        Ok(Self {
            repo: entry.repo.clone(),
            id: entry.id.clone(),
            pr: entry.pr as i64,
            entry_type: entry_type_str(entry.entry_type),
            subtype: entry.subtype.clone(),
            author: entry.author.clone(),
            body: entry.body.clone(),
            state: entry.state.map(review_state_str),
            file: entry.file.clone(),
            line: entry.line.map(|l| l as i64),
            thread_id: entry.thread_id.clone(),
            thread_resolved: entry.thread_resolved,
            created_at: entry.created_at.to_rfc3339(),
            updated_at: entry.updated_at.map(|d| d.to_rfc3339()),
            captured_at: entry.captured_at.to_rfc3339(),
            url: entry.url.clone(),
            pr_title: entry.pr_title.clone(),
            pr_state: pr_state_str(entry.pr_state),
            pr_author: entry.pr_author.clone(),
            pr_branch: entry.pr_branch.clone(),
            pr_labels: entry
                .pr_labels
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| DbError::Internal(e.to_string()))?,
            graphite: entry
                .graphite
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| DbError::Internal(e.to_string()))?,
            file_provenance: entry
                .file_provenance
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| DbError::Internal(e.to_string()))?,
            file_activity_after: entry
                .file_activity_after
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| DbError::Internal(e.to_string()))?,
        })
    }
}

fn parse_dt(s: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| DbError::Internal(format!("bad timestamp {s:?}: {e}")))
}

pub fn entry_from_row(row: &SqliteRow) -> DbResult<Entry> {
    let type_str: String = row.try_get("type")?;
    let pr_state_s: String = row.try_get("pr_state")?;
    let state_s: Option<String> = row.try_get("state")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: Option<String> = row.try_get("updated_at")?;
    let captured_at: String = row.try_get("captured_at")?;
    let pr_labels_json: Option<String> = row.try_get("pr_labels")?;
    let graphite_json: Option<String> = row.try_get("graphite")?;
    let file_provenance_json: Option<String> = row.try_get("file_provenance")?;
    let file_activity_after_json: Option<String> = row.try_get("file_activity_after")?;
    let line: Option<i64> = row.try_get("line")?;

    Ok(Entry {
        id: row.try_get("id")?,
        repo: row.try_get("repo")?,
        pr: row.try_get::<i64, _>("pr")? as u64,
        entry_type: parse_entry_type(&type_str)
            .ok_or_else(|| DbError::Internal(format!("bad entry type {type_str:?}")))?,
        subtype: row.try_get("subtype")?,
        author: row.try_get("author")?,
        body: row.try_get("body")?,
        state: state_s.as_deref().and_then(parse_review_state),
        file: row.try_get("file")?,
        line: line.map(|l| l as u32),
        thread_id: row.try_get("thread_id")?,
        thread_resolved: row.try_get("thread_resolved")?,
        created_at: parse_dt(&created_at)?,
        updated_at: updated_at.as_deref().map(parse_dt).transpose()?,
        captured_at: parse_dt(&captured_at)?,
        url: row.try_get("url")?,
        pr_title: row.try_get("pr_title")?,
        pr_state: parse_pr_state(&pr_state_s)
            .ok_or_else(|| DbError::Internal(format!("bad pr_state {pr_state_s:?}")))?,
        pr_author: row.try_get("pr_author")?,
        pr_branch: row.try_get("pr_branch")?,
        pr_labels: pr_labels_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e: serde_json::Error| DbError::Internal(e.to_string()))?,
        graphite: graphite_json
            .as_deref()
            .map(serde_json::from_str::<GraphiteContext>)
            .transpose()
            .map_err(|e| DbError::Internal(e.to_string()))?,
        file_provenance: file_provenance_json
            .as_deref()
            .map(serde_json::from_str::<FileProvenance>)
            .transpose()
            .map_err(|e| DbError::Internal(e.to_string()))?,
        file_activity_after: file_activity_after_json
            .as_deref()
            .map(serde_json::from_str::<FileActivityAfter>)
            .transpose()
            .map_err(|e| DbError::Internal(e.to_string()))?,
    })
}

pub fn sync_meta_from_row(row: &SqliteRow) -> DbResult<SyncMeta> {
    let scope_s: String = row.try_get("scope")?;
    let last_sync: String = row.try_get("last_sync")?;
    Ok(SyncMeta {
        repo: row.try_get("repo")?,
        scope: match scope_s.as_str() {
            "open" => crate::model::Scope::Open,
            "closed" => crate::model::Scope::Closed,
            other => return Err(DbError::Internal(format!("bad scope {other:?}"))),
        },
        last_sync: parse_dt(&last_sync)?,
        cursor: row.try_get("cursor")?,
        pr_count: row.try_get::<i64, _>("pr_count")? as u64,
    })
}

pub fn ack_from_row(row: &SqliteRow) -> DbResult<Ack> {
    let acked_at: String = row.try_get("acked_at")?;
    Ok(Ack {
        repo: row.try_get("repo")?,
        comment_id: row.try_get("comment_id")?,
        pr: row.try_get::<i64, _>("pr")? as u64,
        acked_at: parse_dt(&acked_at)?,
        acked_by: row.try_get("acked_by")?,
        reaction_added: row.try_get("reaction_added")?,
    })
}

pub fn freeze_from_row(row: &SqliteRow) -> DbResult<Freeze> {
    let kind_s: String = row.try_get("kind")?;
    let frozen_at: String = row.try_get("frozen_at")?;
    Ok(Freeze {
        repo: row.try_get("repo")?,
        pr: row.try_get::<i64, _>("pr")? as u64,
        kind: match kind_s.as_str() {
            "pr" => FreezeKind::Pr,
            "thread" => FreezeKind::Thread,
            other => return Err(DbError::Internal(format!("bad freeze kind {other:?}"))),
        },
        target_id: row.try_get("target_id")?,
        frozen_at: parse_dt(&frozen_at)?,
    })
}
