//! SQL schema for the Herald SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS subscribers (
    subscriber_id  INTEGER PRIMARY KEY,  -- externally assigned, never reused
    locale         TEXT    NOT NULL,
    active         INTEGER NOT NULL DEFAULT 1,
    deactivated_at TEXT,                 -- RFC 3339 UTC; set iff active = 0
    created_at     TEXT    NOT NULL,
    CHECK ((active = 1 AND deactivated_at IS NULL)
        OR (active = 0 AND deactivated_at IS NOT NULL))
);

CREATE INDEX IF NOT EXISTS subscribers_active_idx ON subscribers(active);

CREATE TABLE IF NOT EXISTS settings (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

PRAGMA user_version = 1;
";
