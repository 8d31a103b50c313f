// Append-only change ledger

use chrono::{DateTime, Utc};
use geoquiz_core::FieldKey;
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::error::StoreError;
use crate::schema::{from_ts, to_ts};

/// Operation that produced a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LedgerOrigin {
    Seed,
    ApplyDispute,
    ApplyGap,
    DataUpdated,
    NewCountry,
    SourceRemoved,
    QuizRemoved,
}

impl LedgerOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerOrigin::Seed => "seed",
            LedgerOrigin::ApplyDispute => "apply_dispute_review",
            LedgerOrigin::ApplyGap => "apply_gap_review",
            LedgerOrigin::DataUpdated => "resync:data_updated",
            LedgerOrigin::NewCountry => "resync:new_country",
            LedgerOrigin::SourceRemoved => "resync:source_removed",
            LedgerOrigin::QuizRemoved => "resync:quiz_removed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub origin: String,
    pub label: String,
    /// Empty for entries about a whole record (removals).
    pub field_key: String,
    pub old_value: String,
    pub new_value: String,
    pub recorded_at: DateTime<Utc>,
}

pub(crate) fn append(
    conn: &Connection,
    origin: LedgerOrigin,
    label: &str,
    key: Option<FieldKey>,
    old_value: &str,
    new_value: &str,
    at: DateTime<Utc>,
) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO change_ledger (origin, label, field_key, old_value, new_value, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            origin.as_str(),
            label,
            key.map(|k| k.json_key()).unwrap_or(""),
            old_value,
            new_value,
            to_ts(at)
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Entries oldest first, optionally for one country.
pub(crate) fn list(conn: &Connection, label: Option<&str>) -> Result<Vec<LedgerEntry>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, origin, label, field_key, old_value, new_value, recorded_at
         FROM change_ledger
         WHERE ?1 IS NULL OR label = ?1
         ORDER BY id",
    )?;
    let rows = stmt.query_map(params![label], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, String>(6)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (id, origin, label, field_key, old_value, new_value, recorded_at) = row?;
        out.push(LedgerEntry {
            recorded_at: from_ts("change_ledger", &id.to_string(), &recorded_at)?,
            id,
            origin,
            label,
            field_key,
            old_value,
            new_value,
        });
    }
    Ok(out)
}
