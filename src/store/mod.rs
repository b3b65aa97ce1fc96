//! The embedded relational store.
//!
//! A single-writer SQLite database (via `sqlx`) holding PRs, entries, sync
//! cursors, acknowledgements, and freeze markers. Writes are serialized by
//! capping the pool to a single write connection; reads use a separate
//! snapshot-isolated connection so they can proceed concurrently with one
//! in-flight write, per §5's concurrency model.

pub mod error;
pub mod filter;
mod legacy;
mod rows;
mod schema;

pub use error::{DbError, DbResult};
pub use filter::{EntryFilter, PrSelector, TypeSelector};
pub use legacy::read_legacy_repo_jsonl;

use std::path::Path;
use std::str::FromStr;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::model::{Ack, Entry, Freeze, FreezeKind, PrMeta, Scope, SyncMeta};
use crate::store::rows::entry_from_row;

/// The embedded store. Cheaply cloneable — `SqlitePool` is an `Arc` internally.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if absent) the database at `path`, enabling WAL mode
    /// and a busy timeout, then applying the schema.
    pub async fn open(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| DbError::Internal(format!("creating cache dir: {e}")))?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
            .map_err(DbError::Sqlx)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        sqlx::query(crate::store::schema_sql()).execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Open an in-memory database (used by tests).
    pub async fn open_in_memory() -> DbResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        sqlx::query(crate::store::schema_sql()).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// Flush and close the pool. Re-entrant: calling this more than once is
    /// a no-op (the second call operates on an already-closed pool, which
    /// `sqlx` tolerates).
    pub async fn close(&self) {
        if !self.pool.is_closed() {
            self.pool.close().await;
        }
    }

    // -----------------------------------------------------------------
    // PR metadata
    // -----------------------------------------------------------------

    pub async fn upsert_pr(&self, meta: &PrMeta) -> DbResult<()> {
        let labels = serde_json::to_string(&meta.labels)
            .map_err(|e| DbError::Internal(e.to_string()))?;
        sqlx::query(
            r"INSERT INTO pr_meta (repo, number, state, is_draft, title, author, branch, labels)
              VALUES (?, ?, ?, ?, ?, ?, ?, ?)
              ON CONFLICT (repo, number) DO UPDATE SET
                state = excluded.state,
                is_draft = excluded.is_draft,
                title = excluded.title,
                author = excluded.author,
                branch = excluded.branch,
                labels = excluded.labels",
        )
        .bind(&meta.repo)
        .bind(meta.number as i64)
        .bind(pr_state_str(meta.state))
        .bind(meta.is_draft)
        .bind(&meta.title)
        .bind(&meta.author)
        .bind(&meta.branch)
        .bind(labels)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Entries
    // -----------------------------------------------------------------

    /// Insert a batch of entries in a single transaction (idempotent on
    /// `(repo, id)`). Partial failure leaves no rows, per §4.2's invariant.
    ///
    /// Returns the count of genuinely new rows, not the count of rows
    /// touched by the upsert — SQLite's `changes()` (what `rows_affected()`
    /// reports) counts a `DO UPDATE` as affected even when it rewrote an
    /// unchanged row, so that count can't be used for `entriesAdded`
    /// without over-reporting on a re-sync.
    pub async fn insert_entries(&self, entries: &[Entry]) -> DbResult<u64> {
        if entries.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;
        for entry in entries {
            let p = rows::EntryParams::from_entry(entry)?;
            let already_present =
                sqlx::query("SELECT 1 as one FROM entries WHERE repo = ? AND id = ?")
                    .bind(p.repo.as_str())
                    .bind(p.id.as_str())
                    .fetch_optional(&mut *tx)
                    .await?
                    .is_some();
            sqlx::query(rows::INSERT_ENTRY_SQL)
                .bind(p.repo)
                .bind(p.id)
                .bind(p.pr)
                .bind(p.entry_type)
                .bind(p.subtype)
                .bind(p.author)
                .bind(p.body)
                .bind(p.state)
                .bind(p.file)
                .bind(p.line)
                .bind(p.thread_id)
                .bind(p.thread_resolved)
                .bind(p.created_at)
                .bind(p.updated_at)
                .bind(p.captured_at)
                .bind(p.url)
                .bind(p.pr_title)
                .bind(p.pr_state)
                .bind(p.pr_author)
                .bind(p.pr_branch)
                .bind(p.pr_labels)
                .bind(p.graphite)
                .bind(p.file_provenance)
                .bind(p.file_activity_after)
                .execute(&mut *tx)
                .await?;
            if !already_present {
                inserted += 1;
            }
        }
        tx.commit().await?;
        Ok(inserted)
    }

    /// Upsert a single entry in place — used by the staleness check to
    /// write back `file_activity_after`.
    pub async fn update_entry(&self, entry: &Entry) -> DbResult<()> {
        self.insert_entries(std::slice::from_ref(entry)).await?;
        Ok(())
    }

    pub async fn query_entries(
        &self,
        filter: &EntryFilter,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> DbResult<Vec<Entry>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM entries WHERE 1=1");
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, id ASC");
        if let Some(limit) = limit {
            qb.push(" LIMIT ").push_bind(limit);
            if let Some(offset) = offset {
                qb.push(" OFFSET ").push_bind(offset);
            }
        }
        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(entry_from_row).collect()
    }

    pub async fn count_entries(&self, filter: &EntryFilter) -> DbResult<i64> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) as n FROM entries WHERE 1=1");
        push_filter(&mut qb, filter);
        let row = qb.build().fetch_one(&self.pool).await?;
        Ok(row.try_get::<i64, _>("n")?)
    }

    pub async fn get_repos(&self) -> DbResult<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT repo FROM entries ORDER BY repo")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|r| Ok(r.try_get::<String, _>("repo")?)).collect()
    }

    // -----------------------------------------------------------------
    // SyncMeta
    // -----------------------------------------------------------------

    pub async fn get_all_sync_meta(&self) -> DbResult<Vec<SyncMeta>> {
        let rows = sqlx::query("SELECT * FROM sync_meta ORDER BY repo, scope")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(rows::sync_meta_from_row).collect()
    }

    pub async fn get_sync_meta(&self, repo: &str, scope: Scope) -> DbResult<Option<SyncMeta>> {
        let row = sqlx::query("SELECT * FROM sync_meta WHERE repo = ? AND scope = ?")
            .bind(repo)
            .bind(scope.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(rows::sync_meta_from_row).transpose()
    }

    /// Write `SyncMeta`. The caller (sync engine) is responsible for only
    /// calling this after a batch's entries are durably inserted — see §4.4
    /// step 5.
    pub async fn set_sync_meta(&self, meta: &SyncMeta) -> DbResult<()> {
        sqlx::query(
            r"INSERT INTO sync_meta (repo, scope, last_sync, cursor, pr_count)
              VALUES (?, ?, ?, ?, ?)
              ON CONFLICT (repo, scope) DO UPDATE SET
                last_sync = excluded.last_sync,
                cursor = excluded.cursor,
                pr_count = excluded.pr_count",
        )
        .bind(&meta.repo)
        .bind(meta.scope.as_str())
        .bind(meta.last_sync.to_rfc3339())
        .bind(&meta.cursor)
        .bind(meta.pr_count as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Acks
    // -----------------------------------------------------------------

    pub async fn add_ack(&self, ack: &Ack) -> DbResult<()> {
        sqlx::query(
            r"INSERT INTO acks (repo, comment_id, pr, acked_at, acked_by, reaction_added)
              VALUES (?, ?, ?, ?, ?, ?)
              ON CONFLICT (repo, comment_id) DO UPDATE SET
                acked_at = excluded.acked_at,
                acked_by = excluded.acked_by,
                reaction_added = excluded.reaction_added",
        )
        .bind(&ack.repo)
        .bind(&ack.comment_id)
        .bind(ack.pr as i64)
        .bind(ack.acked_at.to_rfc3339())
        .bind(&ack.acked_by)
        .bind(ack.reaction_added)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Add several acks idempotently, in one transaction.
    pub async fn add_acks(&self, acks: &[Ack]) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        for ack in acks {
            sqlx::query(
                r"INSERT INTO acks (repo, comment_id, pr, acked_at, acked_by, reaction_added)
                  VALUES (?, ?, ?, ?, ?, ?)
                  ON CONFLICT (repo, comment_id) DO UPDATE SET
                    acked_at = excluded.acked_at,
                    acked_by = excluded.acked_by,
                    reaction_added = excluded.reaction_added",
            )
            .bind(&ack.repo)
            .bind(&ack.comment_id)
            .bind(ack.pr as i64)
            .bind(ack.acked_at.to_rfc3339())
            .bind(&ack.acked_by)
            .bind(ack.reaction_added)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn remove_ack(&self, repo: &str, comment_id: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM acks WHERE repo = ? AND comment_id = ?")
            .bind(repo)
            .bind(comment_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn is_acked(&self, repo: &str, comment_id: &str) -> DbResult<bool> {
        let row = sqlx::query("SELECT 1 as one FROM acks WHERE repo = ? AND comment_id = ?")
            .bind(repo)
            .bind(comment_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn read_acks(&self, repo: &str) -> DbResult<Vec<Ack>> {
        let rows = sqlx::query("SELECT * FROM acks WHERE repo = ? ORDER BY acked_at DESC")
            .bind(repo)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(rows::ack_from_row).collect()
    }

    pub async fn get_acked_ids(&self, repo: Option<&str>) -> DbResult<Vec<String>> {
        let rows = match repo {
            Some(repo) => {
                sqlx::query("SELECT comment_id FROM acks WHERE repo = ?")
                    .bind(repo)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => sqlx::query("SELECT comment_id FROM acks").fetch_all(&self.pool).await?,
        };
        rows.iter()
            .map(|r| Ok(r.try_get::<String, _>("comment_id")?))
            .collect()
    }

    // -----------------------------------------------------------------
    // Freezes
    // -----------------------------------------------------------------

    pub async fn add_freeze(&self, freeze: &Freeze) -> DbResult<()> {
        sqlx::query(
            r"INSERT INTO freezes (repo, pr, kind, target_id, frozen_at)
              VALUES (?, ?, ?, ?, ?)
              ON CONFLICT (repo, pr, kind, target_id) DO UPDATE SET
                frozen_at = excluded.frozen_at",
        )
        .bind(&freeze.repo)
        .bind(freeze.pr as i64)
        .bind(freeze_kind_str(freeze.kind))
        .bind(&freeze.target_id)
        .bind(freeze.frozen_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove_freeze(
        &self,
        repo: &str,
        pr: u64,
        kind: FreezeKind,
        target_id: &str,
    ) -> DbResult<()> {
        sqlx::query(
            "DELETE FROM freezes WHERE repo = ? AND pr = ? AND kind = ? AND target_id = ?",
        )
        .bind(repo)
        .bind(pr as i64)
        .bind(freeze_kind_str(kind))
        .bind(target_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_freezes(&self, repo: Option<&str>) -> DbResult<Vec<Freeze>> {
        let rows = match repo {
            Some(repo) => {
                sqlx::query("SELECT * FROM freezes WHERE repo = ?")
                    .bind(repo)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => sqlx::query("SELECT * FROM freezes").fetch_all(&self.pool).await?,
        };
        rows.iter().map(rows::freeze_from_row).collect()
    }

    // -----------------------------------------------------------------
    // Lookout timestamp (§4.7)
    // -----------------------------------------------------------------

    pub async fn get_lookout_last_run(&self) -> DbResult<Option<chrono::DateTime<Utc>>> {
        let row = sqlx::query("SELECT last_run FROM lookout_meta WHERE key = 'default'")
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let s: String = row.try_get("last_run")?;
                Ok(Some(
                    chrono::DateTime::parse_from_rfc3339(&s)
                        .map_err(|e| DbError::Internal(e.to_string()))?
                        .with_timezone(&Utc),
                ))
            }
            None => Ok(None),
        }
    }

    /// Written atomically, after the lookout summary has been produced.
    pub async fn set_lookout_last_run(&self, at: chrono::DateTime<Utc>) -> DbResult<()> {
        sqlx::query(
            r"INSERT INTO lookout_meta (key, last_run) VALUES ('default', ?)
              ON CONFLICT (key) DO UPDATE SET last_run = excluded.last_run",
        )
        .bind(at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Clear
    // -----------------------------------------------------------------

    /// Tear down the entire store. Requires the pool already closed by the
    /// caller first (§4.2's invariant (c)); this only drops the rows, it
    /// does not remove the file — callers that want to delete the file
    /// entirely must `close()` first and then remove the path themselves.
    pub async fn clear_all(&self) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        for table in ["entries", "pr_meta", "sync_meta", "acks", "freezes", "lookout_meta"] {
            sqlx::query(&format!("DELETE FROM {table}")).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

fn freeze_kind_str(kind: FreezeKind) -> &'static str {
    match kind {
        FreezeKind::Pr => "pr",
        FreezeKind::Thread => "thread",
    }
}

fn push_filter<'a>(qb: &mut QueryBuilder<'a, Sqlite>, filter: &'a EntryFilter) {
    if let Some(repo) = &filter.repo {
        if filter.exact_repo {
            qb.push(" AND repo = ").push_bind(repo.as_str());
        } else {
            qb.push(" AND repo LIKE ").push_bind(format!("%{repo}%"));
        }
    }
    match &filter.pr {
        Some(PrSelector::Single(n)) => {
            qb.push(" AND pr = ").push_bind(*n as i64);
        }
        Some(PrSelector::Many(ns)) if !ns.is_empty() => {
            qb.push(" AND pr IN (");
            let mut sep = qb.separated(", ");
            for n in ns {
                sep.push_bind(*n as i64);
            }
            qb.push(")");
        }
        _ => {}
    }
    match &filter.entry_type {
        Some(TypeSelector::Single(t)) => {
            qb.push(" AND type = ").push_bind(entry_type_str(*t));
        }
        Some(TypeSelector::Many(ts)) if !ts.is_empty() => {
            qb.push(" AND type IN (");
            let mut sep = qb.separated(", ");
            for t in ts {
                sep.push_bind(entry_type_str(*t));
            }
            qb.push(")");
        }
        _ => {}
    }
    if !filter.states.is_empty() {
        qb.push(" AND pr_state IN (");
        let mut sep = qb.separated(", ");
        for s in &filter.states {
            sep.push_bind(pr_state_str(*s));
        }
        qb.push(")");
    }
    if let Some(label) = &filter.label {
        qb.push(" AND pr_labels LIKE ").push_bind(format!("%{label}%"));
    }
    if let Some(since) = filter.since {
        qb.push(" AND created_at >= ").push_bind(since.to_rfc3339());
    }
    if let Some(before) = filter.before {
        qb.push(" AND created_at <= ").push_bind(before.to_rfc3339());
    }
    if let Some(author) = &filter.author {
        qb.push(" AND author = ").push_bind(author.as_str());
    }
    if let Some(id) = &filter.id {
        qb.push(" AND id = ").push_bind(id.as_str());
    }
}

pub(crate) fn entry_type_str(t: crate::model::EntryType) -> &'static str {
    use crate::model::EntryType::*;
    match t {
        Comment => "comment",
        Review => "review",
        Commit => "commit",
        Ci => "ci",
        Event => "event",
    }
}

pub(crate) fn pr_state_str(s: crate::model::PrState) -> &'static str {
    use crate::model::PrState::*;
    match s {
        Open => "open",
        Closed => "closed",
        Merged => "merged",
        Draft => "draft",
    }
}

fn schema_sql() -> &'static str {
    schema::SCHEMA
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::{EntryType, PrState};

    fn sample_entry(id: &str, repo: &str, pr: u64) -> Entry {
        Entry {
            id: id.to_owned(),
            repo: repo.to_owned(),
            pr,
            entry_type: EntryType::Comment,
            subtype: Some("issue_comment".to_owned()),
            author: "alice".to_owned(),
            body: Some("hi".to_owned()),
            state: None,
            file: None,
            line: None,
            thread_id: None,
            thread_resolved: None,
            created_at: Utc::now(),
            updated_at: None,
            captured_at: Utc::now(),
            url: None,
            pr_title: "Title".to_owned(),
            pr_state: PrState::Open,
            pr_author: "bob".to_owned(),
            pr_branch: "feature".to_owned(),
            pr_labels: None,
            graphite: None,
            file_provenance: None,
            file_activity_after: None,
        }
    }

    #[tokio::test]
    async fn insert_entries_is_idempotent() {
        let store = Store::open_in_memory().await.unwrap();
        let entry = sample_entry("abc", "acme/widgets", 1);
        let inserted_first = store.insert_entries(&[entry.clone()]).await.unwrap();
        assert_eq!(inserted_first, 1);
        let inserted_second = store.insert_entries(&[entry]).await.unwrap();
        assert_eq!(inserted_second, 0, "re-inserting an unchanged row adds nothing new");

        let count = store
            .count_entries(&EntryFilter::for_repo("acme/widgets"))
            .await
            .unwrap();
        assert_eq!(count, 1, "no duplicate row was created");
    }

    #[tokio::test]
    async fn resync_preserves_staleness_check_enrichment() {
        let store = Store::open_in_memory().await.unwrap();
        let entry = sample_entry("abc", "acme/widgets", 1);
        store.insert_entries(&[entry.clone()]).await.unwrap();

        let mut enriched = entry.clone();
        enriched.file_activity_after = Some(crate::model::FileActivityAfter {
            modified: true,
            commits_touching_file: 2,
            latest_commit: Some("deadbeef".to_owned()),
            latest_commit_at: Some(Utc::now()),
            resolver_unavailable: false,
        });
        store.update_entry(&enriched).await.unwrap();

        // A later re-sync refetches the PR and hands back the same entry
        // with no `file_activity_after` (only the `check` pass writes that
        // block) — it must not wipe out what `check` already wrote.
        store.insert_entries(&[entry]).await.unwrap();

        let refetched = store
            .query_entries(&EntryFilter::for_repo("acme/widgets"), None, None)
            .await
            .unwrap();
        assert_eq!(refetched.len(), 1);
        let activity = refetched[0]
            .file_activity_after
            .as_ref()
            .expect("staleness enrichment should survive a re-sync");
        assert_eq!(activity.commits_touching_file, 2);
    }

    #[tokio::test]
    async fn query_entries_sorts_by_created_at_desc_then_id() {
        let store = Store::open_in_memory().await.unwrap();
        let mut older = sample_entry("a", "acme/widgets", 1);
        older.created_at = Utc::now() - chrono::Duration::hours(2);
        let mut newer = sample_entry("b", "acme/widgets", 1);
        newer.created_at = Utc::now();
        store.insert_entries(&[older.clone(), newer.clone()]).await.unwrap();

        let results = store
            .query_entries(&EntryFilter::for_repo("acme/widgets"), None, None)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "b");
        assert_eq!(results[1].id, "a");
    }

    #[tokio::test]
    async fn ack_is_idempotent_and_removable() {
        let store = Store::open_in_memory().await.unwrap();
        let ack = Ack {
            repo: "acme/widgets".to_owned(),
            comment_id: "c1".to_owned(),
            pr: 1,
            acked_at: Utc::now(),
            acked_by: Some("alice".to_owned()),
            reaction_added: false,
        };
        store.add_ack(&ack).await.unwrap();
        store.add_ack(&ack).await.unwrap();
        let acks = store.read_acks("acme/widgets").await.unwrap();
        assert_eq!(acks.len(), 1);

        store.remove_ack("acme/widgets", "c1").await.unwrap();
        assert!(!store.is_acked("acme/widgets", "c1").await.unwrap());
    }

    #[tokio::test]
    async fn sync_meta_round_trips() {
        let store = Store::open_in_memory().await.unwrap();
        let meta = SyncMeta {
            repo: "acme/widgets".to_owned(),
            scope: Scope::Open,
            last_sync: Utc::now(),
            cursor: Some("cursor1".to_owned()),
            pr_count: 3,
        };
        store.set_sync_meta(&meta).await.unwrap();
        let fetched = store
            .get_sync_meta("acme/widgets", Scope::Open)
            .await
            .unwrap()
            .expect("should exist");
        assert_eq!(fetched.cursor, Some("cursor1".to_owned()));
        assert_eq!(fetched.pr_count, 3);
    }

    #[tokio::test]
    async fn freeze_hides_entries_after_cutoff_when_queried_manually() {
        let store = Store::open_in_memory().await.unwrap();
        let mut entry = sample_entry("thread-comment", "acme/widgets", 1);
        entry.subtype = Some("review_comment".to_owned());
        entry.thread_id = Some("t1".to_owned());
        entry.created_at = Utc::now();
        store.insert_entries(&[entry]).await.unwrap();

        let freeze = Freeze {
            repo: "acme/widgets".to_owned(),
            pr: 1,
            kind: FreezeKind::Thread,
            target_id: "t1".to_owned(),
            frozen_at: Utc::now() - chrono::Duration::hours(1),
        };
        store.add_freeze(&freeze).await.unwrap();
        let freezes = store.list_freezes(Some("acme/widgets")).await.unwrap();
        assert_eq!(freezes.len(), 1);
        assert_eq!(freezes[0].target_id, "t1");
    }
}
