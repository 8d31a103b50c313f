// Canonical records (`country_quiz`) and live-source tracking rows (`country_source`)

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use geoquiz_core::{CountryFacts, CountryRecord};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StoreError;
use crate::schema::{from_ts, to_ts};

pub(crate) const CANONICAL: &str = "country_quiz";

fn decode(label: String, data: String, updated_at: String) -> Result<CountryRecord, StoreError> {
    let updated_at = from_ts(CANONICAL, &label, &updated_at)?;
    Ok(CountryRecord::from_json_str(&label, &data, updated_at)?)
}

pub(crate) fn get_record(conn: &Connection, label: &str) -> Result<Option<CountryRecord>, StoreError> {
    let row: Option<(String, String, String)> = conn
        .query_row(
            "SELECT label, data, updated_at FROM country_quiz WHERE label = ?1",
            params![label],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    row.map(|(label, data, updated_at)| decode(label, data, updated_at))
        .transpose()
}

pub(crate) fn list_records(conn: &Connection) -> Result<Vec<CountryRecord>, StoreError> {
    let mut stmt = conn.prepare("SELECT label, data, updated_at FROM country_quiz ORDER BY label")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (label, data, updated_at) = row?;
        out.push(decode(label, data, updated_at)?);
    }
    Ok(out)
}

fn labels_of(conn: &Connection, sql: &str) -> Result<BTreeSet<String>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut out = BTreeSet::new();
    for row in rows {
        out.insert(row?);
    }
    Ok(out)
}

pub(crate) fn record_labels(conn: &Connection) -> Result<BTreeSet<String>, StoreError> {
    labels_of(conn, "SELECT label FROM country_quiz")
}

pub(crate) fn count(conn: &Connection, table: &str) -> Result<usize, StoreError> {
    let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
    Ok(n as usize)
}

pub(crate) fn put_record(conn: &Connection, record: &CountryRecord) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO country_quiz (label, data, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(label) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
        params![record.label, record.to_json_string(), to_ts(record.updated_at)],
    )?;
    Ok(())
}

pub(crate) fn delete_record(conn: &Connection, label: &str) -> Result<bool, StoreError> {
    let n = conn.execute("DELETE FROM country_quiz WHERE label = ?1", params![label])?;
    Ok(n > 0)
}

// ---------------------------------------------------------------------------
// Live-source tracking
// ---------------------------------------------------------------------------

pub(crate) fn tracked_labels(conn: &Connection) -> Result<BTreeSet<String>, StoreError> {
    labels_of(conn, "SELECT label FROM country_source")
}

pub(crate) fn upsert_tracked(conn: &Connection, facts: &CountryFacts, at: DateTime<Utc>) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO country_source (label, data, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(label) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
        params![facts.label, facts.to_json().to_string(), to_ts(at)],
    )?;
    Ok(())
}

pub(crate) fn delete_tracked(conn: &Connection, label: &str) -> Result<bool, StoreError> {
    let n = conn.execute("DELETE FROM country_source WHERE label = ?1", params![label])?;
    Ok(n > 0)
}
