//! Review queue: gap reviews and dispute reviews.
//!
//! Both kinds share one lifecycle. An item is created pending with an empty
//! suggestion, receives a suggestion, then a human approves or bypasses it.
//! Approved items are applied exactly once. Every transition is a
//! compare-and-set `UPDATE`, so the returned row count tells the caller
//! whether the transition happened.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use geoquiz_core::FieldKey;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::error::StoreError;
use crate::schema::{from_ts, to_ts};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewKind {
    Gap,
    Dispute,
}

impl ReviewKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewKind::Gap => "gap",
            ReviewKind::Dispute => "dispute",
        }
    }

    fn table(&self) -> &'static str {
        match self {
            ReviewKind::Gap => "gap_review",
            ReviewKind::Dispute => "dispute_review",
        }
    }
}

impl fmt::Display for ReviewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gap" | "gaps" => Ok(ReviewKind::Gap),
            "dispute" | "disputes" | "report" => Ok(ReviewKind::Dispute),
            _ => Err(format!("unknown review kind '{s}' (expected gap or dispute)")),
        }
    }
}

/// Human decision on a review item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Pending,
    Approved,
    Bypassed,
}

impl Decision {
    fn to_db(self) -> i64 {
        match self {
            Decision::Pending => 0,
            Decision::Approved => 1,
            Decision::Bypassed => 2,
        }
    }

    fn from_db(v: i64) -> Option<Self> {
        match v {
            0 => Some(Decision::Pending),
            1 => Some(Decision::Approved),
            2 => Some(Decision::Bypassed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GapReview {
    pub id: i64,
    pub label: String,
    pub field_key: String,
    pub current_value: String,
    pub suggested_value: String,
    pub decision: Decision,
    pub applied: bool,
    pub created_at: DateTime<Utc>,
}

impl GapReview {
    pub fn key(&self) -> Option<FieldKey> {
        FieldKey::from_json_key(&self.field_key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisputeReview {
    pub id: i64,
    pub reporter: String,
    pub question: String,
    pub label: String,
    pub correct_answer: String,
    pub suggested_value: String,
    pub decision: Decision,
    pub applied: bool,
    pub created_at: DateTime<Utc>,
}

/// A quiz taker's challenge to a displayed answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDispute {
    pub reporter: String,
    pub question: String,
    pub label: String,
    pub correct_answer: String,
}

/// Suggestion, decision and applied state, common to both kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewState {
    pub suggested_value: String,
    pub decision: Decision,
    pub applied: bool,
}

// ---------------------------------------------------------------------------
// Row decoding
// ---------------------------------------------------------------------------

const GAP_COLUMNS: &str =
    "id, label, field_key, current_value, suggested_value, decision, applied, created_at";
const DISPUTE_COLUMNS: &str =
    "id, reporter, question, label, correct_answer, suggested_value, decision, applied, created_at";

struct RawGap {
    id: i64,
    label: String,
    field_key: String,
    current_value: String,
    suggested_value: String,
    decision: i64,
    applied: bool,
    created_at: String,
}

fn raw_gap(row: &Row<'_>) -> rusqlite::Result<RawGap> {
    Ok(RawGap {
        id: row.get(0)?,
        label: row.get(1)?,
        field_key: row.get(2)?,
        current_value: row.get(3)?,
        suggested_value: row.get(4)?,
        decision: row.get(5)?,
        applied: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn decision(table: &'static str, id: i64, raw: i64) -> Result<Decision, StoreError> {
    Decision::from_db(raw).ok_or_else(|| StoreError::Corrupt {
        table,
        key: id.to_string(),
        message: format!("unknown decision {raw}"),
    })
}

impl RawGap {
    fn decode(self) -> Result<GapReview, StoreError> {
        Ok(GapReview {
            decision: decision("gap_review", self.id, self.decision)?,
            created_at: from_ts("gap_review", &self.id.to_string(), &self.created_at)?,
            id: self.id,
            label: self.label,
            field_key: self.field_key,
            current_value: self.current_value,
            suggested_value: self.suggested_value,
            applied: self.applied,
        })
    }
}

struct RawDispute {
    id: i64,
    reporter: String,
    question: String,
    label: String,
    correct_answer: String,
    suggested_value: String,
    decision: i64,
    applied: bool,
    created_at: String,
}

fn raw_dispute(row: &Row<'_>) -> rusqlite::Result<RawDispute> {
    Ok(RawDispute {
        id: row.get(0)?,
        reporter: row.get(1)?,
        question: row.get(2)?,
        label: row.get(3)?,
        correct_answer: row.get(4)?,
        suggested_value: row.get(5)?,
        decision: row.get(6)?,
        applied: row.get(7)?,
        created_at: row.get(8)?,
    })
}

impl RawDispute {
    fn decode(self) -> Result<DisputeReview, StoreError> {
        Ok(DisputeReview {
            decision: decision("dispute_review", self.id, self.decision)?,
            created_at: from_ts("dispute_review", &self.id.to_string(), &self.created_at)?,
            id: self.id,
            reporter: self.reporter,
            question: self.question,
            label: self.label,
            correct_answer: self.correct_answer,
            suggested_value: self.suggested_value,
            applied: self.applied,
        })
    }
}

fn query_gaps(conn: &Connection, filter: &str) -> Result<Vec<GapReview>, StoreError> {
    let sql = format!("SELECT {GAP_COLUMNS} FROM gap_review WHERE {filter} ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], raw_gap)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?.decode()?);
    }
    Ok(out)
}

fn query_disputes(conn: &Connection, filter: &str) -> Result<Vec<DisputeReview>, StoreError> {
    let sql = format!("SELECT {DISPUTE_COLUMNS} FROM dispute_review WHERE {filter} ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], raw_dispute)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?.decode()?);
    }
    Ok(out)
}

// Filters for each lifecycle stage.
const NEEDS_SUGGESTION: &str = "suggested_value = '' AND decision = 0 AND applied = 0";
const AWAITING_DECISION: &str = "decision = 0 AND applied = 0";
const AWAITING_GAP_DECISION: &str = "suggested_value <> '' AND decision = 0 AND applied = 0";
const READY_TO_APPLY: &str = "decision = 1 AND applied = 0";

// ---------------------------------------------------------------------------
// Gap reviews
// ---------------------------------------------------------------------------

/// Insert a pending gap review unless one with the same
/// `(label, field, current value)` already exists in any state.
/// Returns `true` when a row was inserted.
pub(crate) fn insert_gap_if_absent(
    conn: &Connection,
    label: &str,
    key: FieldKey,
    current_value: &str,
    at: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM gap_review WHERE label = ?1 AND field_key = ?2 AND current_value = ?3)",
        params![label, key.json_key(), current_value],
        |row| row.get(0),
    )?;
    if exists {
        return Ok(false);
    }

    // The unique index covers a concurrent insert between the check and here.
    let n = conn.execute(
        "INSERT OR IGNORE INTO gap_review (label, field_key, current_value, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![label, key.json_key(), current_value, to_ts(at)],
    )?;
    Ok(n > 0)
}

pub(crate) fn get_gap(conn: &Connection, id: i64) -> Result<Option<GapReview>, StoreError> {
    let sql = format!("SELECT {GAP_COLUMNS} FROM gap_review WHERE id = ?1");
    conn.query_row(&sql, params![id], raw_gap)
        .optional()?
        .map(RawGap::decode)
        .transpose()
}

pub(crate) fn list_gaps(conn: &Connection) -> Result<Vec<GapReview>, StoreError> {
    query_gaps(conn, "1 = 1")
}

pub(crate) fn gaps_needing_suggestion(conn: &Connection) -> Result<Vec<GapReview>, StoreError> {
    query_gaps(conn, NEEDS_SUGGESTION)
}

pub(crate) fn gaps_awaiting_decision(conn: &Connection) -> Result<Vec<GapReview>, StoreError> {
    query_gaps(conn, AWAITING_GAP_DECISION)
}

pub(crate) fn approved_unapplied_gaps(conn: &Connection) -> Result<Vec<GapReview>, StoreError> {
    query_gaps(conn, READY_TO_APPLY)
}

/// Mark every still-open gap review of `(label, key)` as applied, leaving
/// its suggestion unused. Bypassed items stay as they are.
pub(crate) fn close_open_gaps(conn: &Connection, label: &str, key: FieldKey) -> Result<usize, StoreError> {
    let n = conn.execute(
        "UPDATE gap_review SET applied = 1
         WHERE label = ?1 AND field_key = ?2 AND applied = 0 AND decision <> 2",
        params![label, key.json_key()],
    )?;
    Ok(n)
}

// ---------------------------------------------------------------------------
// Dispute reviews
// ---------------------------------------------------------------------------

pub(crate) fn create_dispute(conn: &Connection, dispute: &NewDispute, at: DateTime<Utc>) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO dispute_review (reporter, question, label, correct_answer, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![dispute.reporter, dispute.question, dispute.label, dispute.correct_answer, to_ts(at)],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn get_dispute(conn: &Connection, id: i64) -> Result<Option<DisputeReview>, StoreError> {
    let sql = format!("SELECT {DISPUTE_COLUMNS} FROM dispute_review WHERE id = ?1");
    conn.query_row(&sql, params![id], raw_dispute)
        .optional()?
        .map(RawDispute::decode)
        .transpose()
}

pub(crate) fn list_disputes(conn: &Connection) -> Result<Vec<DisputeReview>, StoreError> {
    query_disputes(conn, "1 = 1")
}

pub(crate) fn disputes_needing_suggestion(conn: &Connection) -> Result<Vec<DisputeReview>, StoreError> {
    query_disputes(conn, NEEDS_SUGGESTION)
}

pub(crate) fn disputes_awaiting_decision(conn: &Connection) -> Result<Vec<DisputeReview>, StoreError> {
    query_disputes(conn, AWAITING_DECISION)
}

pub(crate) fn approved_unapplied_disputes(conn: &Connection) -> Result<Vec<DisputeReview>, StoreError> {
    query_disputes(conn, READY_TO_APPLY)
}

// ---------------------------------------------------------------------------
// Transitions (both kinds)
// ---------------------------------------------------------------------------

pub(crate) fn review_state(conn: &Connection, kind: ReviewKind, id: i64) -> Result<Option<ReviewState>, StoreError> {
    let sql = format!(
        "SELECT suggested_value, decision, applied FROM {} WHERE id = ?1",
        kind.table()
    );
    let row: Option<(String, i64, bool)> = conn
        .query_row(&sql, params![id], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .optional()?;

    row.map(|(suggested_value, raw, applied)| {
        Ok(ReviewState {
            suggested_value,
            decision: decision(kind.table(), id, raw)?,
            applied,
        })
    })
    .transpose()
}

/// Store a suggestion on an item that has none yet.
pub(crate) fn set_suggestion(conn: &Connection, kind: ReviewKind, id: i64, value: &str) -> Result<bool, StoreError> {
    let sql = format!(
        "UPDATE {} SET suggested_value = ?2 WHERE id = ?1 AND {NEEDS_SUGGESTION}",
        kind.table()
    );
    Ok(conn.execute(&sql, params![id, value])? > 0)
}

/// pending → approved, only with a non-empty suggestion.
pub(crate) fn approve(conn: &Connection, kind: ReviewKind, id: i64) -> Result<bool, StoreError> {
    let sql = format!(
        "UPDATE {} SET decision = ?2 WHERE id = ?1 AND decision = 0 AND applied = 0 AND suggested_value <> ''",
        kind.table()
    );
    Ok(conn.execute(&sql, params![id, Decision::Approved.to_db()])? > 0)
}

/// pending → bypassed. Terminal.
pub(crate) fn bypass(conn: &Connection, kind: ReviewKind, id: i64) -> Result<bool, StoreError> {
    let sql = format!(
        "UPDATE {} SET decision = ?2 WHERE id = ?1 AND decision = 0 AND applied = 0",
        kind.table()
    );
    Ok(conn.execute(&sql, params![id, Decision::Bypassed.to_db()])? > 0)
}

/// approved → applied. `false` when another pass got there first.
pub(crate) fn mark_applied(conn: &Connection, kind: ReviewKind, id: i64) -> Result<bool, StoreError> {
    let sql = format!(
        "UPDATE {} SET applied = 1 WHERE id = ?1 AND decision = 1 AND applied = 0",
        kind.table()
    );
    Ok(conn.execute(&sql, params![id])? > 0)
}
