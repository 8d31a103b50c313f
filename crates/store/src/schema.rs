use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;

use crate::error::StoreError;

pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS country_quiz (
    label TEXT PRIMARY KEY,
    data TEXT NOT NULL,              -- {"<field>": {"value": "<string>"}}
    updated_at TEXT NOT NULL         -- RFC 3339, freshness timestamp
);

CREATE TABLE IF NOT EXISTS country_source (
    label TEXT PRIMARY KEY,          -- countries currently served by a live source
    data TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS gap_review (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    label TEXT NOT NULL,
    field_key TEXT NOT NULL,
    current_value TEXT NOT NULL,
    suggested_value TEXT NOT NULL DEFAULT '',
    decision INTEGER NOT NULL DEFAULT 0,   -- 0=pending, 1=approved, 2=bypassed
    applied INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_gap_review_triple
    ON gap_review (label, field_key, current_value);

CREATE TABLE IF NOT EXISTS dispute_review (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    reporter TEXT NOT NULL,
    question TEXT NOT NULL,
    label TEXT NOT NULL,
    correct_answer TEXT NOT NULL,
    suggested_value TEXT NOT NULL DEFAULT '',
    decision INTEGER NOT NULL DEFAULT 0,
    applied INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS change_ledger (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    origin TEXT NOT NULL,
    label TEXT NOT NULL,
    field_key TEXT NOT NULL,         -- '' for whole-record entries
    old_value TEXT NOT NULL,
    new_value TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_change_ledger_label ON change_ledger (label);

CREATE TABLE IF NOT EXISTS run_lock (
    name TEXT PRIMARY KEY,
    holder TEXT NOT NULL,
    acquired_at TEXT NOT NULL
);
"#;

pub(crate) fn init(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Lossless RFC 3339 text, so stored timestamps compare exactly.
pub(crate) fn to_ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub(crate) fn from_ts(table: &'static str, key: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            table,
            key: key.to_string(),
            message: format!("bad timestamp '{raw}': {e}"),
        })
}
