//! `geoquiz-store`: SQLite persistence for the curation pipeline.
//!
//! ## Tables
//!
//! - `country_quiz` - canonical records, one JSON document per country
//! - `country_source` - countries currently served by a live source
//! - `gap_review` / `dispute_review` - the review queue
//! - `change_ledger` - append-only audit trail
//! - `run_lock` - advisory lock serializing pipeline runs
//!
//! Reads go through [`Store`]. Every mutation goes through a
//! [`UnitOfWork`], one per entity, rolled back unless committed.

mod canonical;
mod error;
mod ledger;
mod lock;
mod reviews;
mod schema;

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use geoquiz_core::{CountryFacts, CountryRecord, FieldKey};
use rusqlite::{Connection, Transaction};

pub use error::StoreError;
pub use ledger::{LedgerEntry, LedgerOrigin};
pub use lock::RunLock;
pub use reviews::{Decision, DisputeReview, GapReview, NewDispute, ReviewKind, ReviewState};

/// Name of the lock row taken by pipeline commands.
pub const PIPELINE_LOCK: &str = "pipeline";

#[derive(Debug)]
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Io(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }

        log::debug!("opening store at {}", path.display());
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        schema::init(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        schema::init(&conn)?;
        Ok(Self { conn })
    }

    /// Start a unit of work. Only one may be open at a time.
    pub fn begin(&self) -> Result<UnitOfWork<'_>, StoreError> {
        Ok(UnitOfWork {
            tx: self.conn.unchecked_transaction()?,
        })
    }

    /// Take the named run lock, stealing it when older than `stale_after`.
    pub fn lock(
        &self,
        name: &str,
        holder: &str,
        stale_after: Duration,
        now: DateTime<Utc>,
    ) -> Result<RunLock<'_>, StoreError> {
        RunLock::acquire(self, name, holder, stale_after, now)
    }

    // -- canonical --------------------------------------------------------

    pub fn get_record(&self, label: &str) -> Result<Option<CountryRecord>, StoreError> {
        canonical::get_record(&self.conn, label)
    }

    pub fn list_records(&self) -> Result<Vec<CountryRecord>, StoreError> {
        canonical::list_records(&self.conn)
    }

    pub fn record_labels(&self) -> Result<BTreeSet<String>, StoreError> {
        canonical::record_labels(&self.conn)
    }

    pub fn count_records(&self) -> Result<usize, StoreError> {
        canonical::count(&self.conn, canonical::CANONICAL)
    }

    pub fn tracked_labels(&self) -> Result<BTreeSet<String>, StoreError> {
        canonical::tracked_labels(&self.conn)
    }

    // -- review queue -----------------------------------------------------

    pub fn get_gap(&self, id: i64) -> Result<Option<GapReview>, StoreError> {
        reviews::get_gap(&self.conn, id)
    }

    pub fn list_gaps(&self) -> Result<Vec<GapReview>, StoreError> {
        reviews::list_gaps(&self.conn)
    }

    /// Pending gaps with no suggestion yet.
    pub fn gaps_needing_suggestion(&self) -> Result<Vec<GapReview>, StoreError> {
        reviews::gaps_needing_suggestion(&self.conn)
    }

    /// Pending gaps that carry a suggestion: the admin's queue.
    pub fn gaps_awaiting_decision(&self) -> Result<Vec<GapReview>, StoreError> {
        reviews::gaps_awaiting_decision(&self.conn)
    }

    pub fn approved_unapplied_gaps(&self) -> Result<Vec<GapReview>, StoreError> {
        reviews::approved_unapplied_gaps(&self.conn)
    }

    pub fn get_dispute(&self, id: i64) -> Result<Option<DisputeReview>, StoreError> {
        reviews::get_dispute(&self.conn, id)
    }

    pub fn list_disputes(&self) -> Result<Vec<DisputeReview>, StoreError> {
        reviews::list_disputes(&self.conn)
    }

    pub fn disputes_needing_suggestion(&self) -> Result<Vec<DisputeReview>, StoreError> {
        reviews::disputes_needing_suggestion(&self.conn)
    }

    /// Pending disputes, with or without a suggestion.
    pub fn disputes_awaiting_decision(&self) -> Result<Vec<DisputeReview>, StoreError> {
        reviews::disputes_awaiting_decision(&self.conn)
    }

    pub fn approved_unapplied_disputes(&self) -> Result<Vec<DisputeReview>, StoreError> {
        reviews::approved_unapplied_disputes(&self.conn)
    }

    pub fn review_state(&self, kind: ReviewKind, id: i64) -> Result<Option<ReviewState>, StoreError> {
        reviews::review_state(&self.conn, kind, id)
    }

    // -- ledger -----------------------------------------------------------

    pub fn ledger(&self, label: Option<&str>) -> Result<Vec<LedgerEntry>, StoreError> {
        ledger::list(&self.conn, label)
    }
}

/// One entity's worth of mutations, wrapping a SQLite transaction.
///
/// Dropping without [`UnitOfWork::commit`] rolls everything back.
pub struct UnitOfWork<'a> {
    tx: Transaction<'a>,
}

impl UnitOfWork<'_> {
    pub fn commit(self) -> Result<(), StoreError> {
        self.tx.commit()?;
        Ok(())
    }

    pub fn get_record(&self, label: &str) -> Result<Option<CountryRecord>, StoreError> {
        canonical::get_record(&self.tx, label)
    }

    pub fn put_record(&self, record: &CountryRecord) -> Result<(), StoreError> {
        canonical::put_record(&self.tx, record)
    }

    pub fn delete_record(&self, label: &str) -> Result<bool, StoreError> {
        canonical::delete_record(&self.tx, label)
    }

    pub fn upsert_tracked(&self, facts: &CountryFacts, at: DateTime<Utc>) -> Result<(), StoreError> {
        canonical::upsert_tracked(&self.tx, facts, at)
    }

    pub fn delete_tracked(&self, label: &str) -> Result<bool, StoreError> {
        canonical::delete_tracked(&self.tx, label)
    }

    pub fn tracked_labels(&self) -> Result<BTreeSet<String>, StoreError> {
        canonical::tracked_labels(&self.tx)
    }

    pub fn insert_gap_if_absent(
        &self,
        label: &str,
        key: FieldKey,
        current_value: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        reviews::insert_gap_if_absent(&self.tx, label, key, current_value, at)
    }

    pub fn close_open_gaps(&self, label: &str, key: FieldKey) -> Result<usize, StoreError> {
        reviews::close_open_gaps(&self.tx, label, key)
    }

    pub fn create_dispute(&self, dispute: &NewDispute, at: DateTime<Utc>) -> Result<i64, StoreError> {
        reviews::create_dispute(&self.tx, dispute, at)
    }

    pub fn set_suggestion(&self, kind: ReviewKind, id: i64, value: &str) -> Result<bool, StoreError> {
        reviews::set_suggestion(&self.tx, kind, id, value)
    }

    pub fn approve(&self, kind: ReviewKind, id: i64) -> Result<bool, StoreError> {
        reviews::approve(&self.tx, kind, id)
    }

    pub fn bypass(&self, kind: ReviewKind, id: i64) -> Result<bool, StoreError> {
        reviews::bypass(&self.tx, kind, id)
    }

    pub fn mark_applied(&self, kind: ReviewKind, id: i64) -> Result<bool, StoreError> {
        reviews::mark_applied(&self.tx, kind, id)
    }

    /// Append one ledger entry. `key` is `None` for whole-record entries.
    pub fn record_change(
        &self,
        origin: LedgerOrigin,
        label: &str,
        key: Option<FieldKey>,
        old_value: &str,
        new_value: &str,
        at: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        ledger::append(&self.tx, origin, label, key, old_value, new_value, at)
    }
}
