//! v001 -- Initial schema creation.
//!
//! Creates the four cache tables: `sessions`, `messages`, `groups`, and
//! `block_lists`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Sessions (cached shadow of the remote "parties" collection)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS sessions (
    id         TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    payload    TEXT NOT NULL,               -- full session record as JSON
    updated_at TEXT NOT NULL                -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Messages (append-only session chat)
-- ----------------------------------------------------------------
-- No FK to sessions: a chat echo can arrive before its session lands in
-- the cache, and the remote store stays the canonical owner of both.
CREATE TABLE IF NOT EXISTS messages (
    id         TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    session_id TEXT NOT NULL,
    author     TEXT NOT NULL,               -- opaque identity handle
    body       TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_session_ts
    ON messages(session_id, created_at ASC);

-- ----------------------------------------------------------------
-- Groups (cached directory entries, for offline membership lookups)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS groups (
    id      TEXT PRIMARY KEY NOT NULL,      -- UUID v4
    name    TEXT NOT NULL,
    zone    TEXT NOT NULL,
    members TEXT NOT NULL                   -- JSON array of identity handles
);

-- ----------------------------------------------------------------
-- Block-lists (one row per owner)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS block_lists (
    owner   TEXT PRIMARY KEY NOT NULL,      -- opaque identity handle
    blocked TEXT NOT NULL                   -- JSON array of identity handles
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
