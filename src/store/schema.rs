/// Schema applied once at startup. No external migrations directory — the
/// teacher's config loader loads everything eagerly at startup, and this
/// crate is small enough that a fixed set of `CREATE TABLE IF NOT EXISTS`
/// statements serves the same purpose without extra machinery.
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS entries (
    repo                TEXT NOT NULL,
    id                  TEXT NOT NULL,
    pr                  INTEGER NOT NULL,
    type                TEXT NOT NULL,
    subtype             TEXT,
    author              TEXT NOT NULL,
    body                TEXT,
    state               TEXT,
    file                TEXT,
    line                INTEGER,
    thread_id           TEXT,
    thread_resolved     INTEGER,
    created_at          TEXT NOT NULL,
    updated_at          TEXT,
    captured_at         TEXT NOT NULL,
    url                 TEXT,
    pr_title            TEXT NOT NULL,
    pr_state            TEXT NOT NULL,
    pr_author           TEXT NOT NULL,
    pr_branch           TEXT NOT NULL,
    pr_labels           TEXT,
    graphite            TEXT,
    file_provenance     TEXT,
    file_activity_after TEXT,
    PRIMARY KEY (repo, id)
);

CREATE INDEX IF NOT EXISTS idx_entries_repo_pr ON entries (repo, pr);
CREATE INDEX IF NOT EXISTS idx_entries_created_at ON entries (created_at DESC, id ASC);
CREATE INDEX IF NOT EXISTS idx_entries_thread ON entries (thread_id);

CREATE TABLE IF NOT EXISTS pr_meta (
    repo    TEXT NOT NULL,
    number  INTEGER NOT NULL,
    state   TEXT NOT NULL,
    is_draft INTEGER NOT NULL,
    title   TEXT NOT NULL,
    author  TEXT NOT NULL,
    branch  TEXT NOT NULL,
    labels  TEXT NOT NULL DEFAULT '[]',
    PRIMARY KEY (repo, number)
);

CREATE TABLE IF NOT EXISTS sync_meta (
    repo       TEXT NOT NULL,
    scope      TEXT NOT NULL,
    last_sync  TEXT NOT NULL,
    cursor     TEXT,
    pr_count   INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (repo, scope)
);

CREATE TABLE IF NOT EXISTS acks (
    repo           TEXT NOT NULL,
    comment_id     TEXT NOT NULL,
    pr             INTEGER NOT NULL,
    acked_at       TEXT NOT NULL,
    acked_by       TEXT,
    reaction_added INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (repo, comment_id)
);

CREATE TABLE IF NOT EXISTS freezes (
    repo      TEXT NOT NULL,
    pr        INTEGER NOT NULL,
    kind      TEXT NOT NULL,
    target_id TEXT NOT NULL,
    frozen_at TEXT NOT NULL,
    PRIMARY KEY (repo, pr, kind, target_id)
);

CREATE TABLE IF NOT EXISTS lookout_meta (
    key        TEXT PRIMARY KEY,
    last_run   TEXT NOT NULL
);
";
