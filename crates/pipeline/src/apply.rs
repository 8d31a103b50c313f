//! Apply step: write approved review suggestions into canonical records.

use chrono::{DateTime, Utc};
use geoquiz_core::FieldKey;
use geoquiz_store::{LedgerOrigin, ReviewKind, Store, StoreError};
use serde::Serialize;

use crate::error::PipelineError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplySummary {
    pub applied: usize,
    /// Dispute question names no known field.
    pub unmapped: usize,
    /// No canonical record for the country; retried next pass.
    pub missing_record: usize,
    /// Already applied by a concurrent pass.
    pub already_applied: usize,
    pub failed: usize,
}

impl ApplySummary {
    fn absorb(&mut self, other: ApplySummary) {
        self.applied += other.applied;
        self.unmapped += other.unmapped;
        self.missing_record += other.missing_record;
        self.already_applied += other.already_applied;
        self.failed += other.failed;
    }
}

enum Outcome {
    Applied,
    MissingRecord,
    AlreadyApplied,
}

struct Approved<'a> {
    kind: ReviewKind,
    id: i64,
    label: &'a str,
    key: FieldKey,
    /// Ledger "old" side: the answer or value the review was raised against.
    old_value: &'a str,
    new_value: &'a str,
}

/// Apply approved disputes, then approved gaps.
pub fn apply_approved(store: &Store, now: DateTime<Utc>) -> Result<ApplySummary, PipelineError> {
    let mut summary = apply_disputes(store, now)?;
    summary.absorb(apply_gaps(store, now)?);
    log::info!(
        "apply: {} applied, {} unmapped, {} without record, {} failed",
        summary.applied,
        summary.unmapped,
        summary.missing_record,
        summary.failed
    );
    Ok(summary)
}

pub fn apply_disputes(store: &Store, now: DateTime<Utc>) -> Result<ApplySummary, PipelineError> {
    let mut summary = ApplySummary::default();

    for dispute in store.approved_unapplied_disputes()? {
        let Some(key) = FieldKey::from_text(&dispute.question) else {
            log::debug!("dispute #{}: question names no field, skipped", dispute.id);
            summary.unmapped += 1;
            continue;
        };
        let item = Approved {
            kind: ReviewKind::Dispute,
            id: dispute.id,
            label: &dispute.label,
            key,
            old_value: &dispute.correct_answer,
            new_value: &dispute.suggested_value,
        };
        tally(&mut summary, &item, apply_one(store, &item, LedgerOrigin::ApplyDispute, now));
    }

    Ok(summary)
}

pub fn apply_gaps(store: &Store, now: DateTime<Utc>) -> Result<ApplySummary, PipelineError> {
    let mut summary = ApplySummary::default();

    for gap in store.approved_unapplied_gaps()? {
        let Some(key) = gap.key() else {
            log::warn!("gap #{}: unknown field key '{}', skipped", gap.id, gap.field_key);
            summary.unmapped += 1;
            continue;
        };
        let item = Approved {
            kind: ReviewKind::Gap,
            id: gap.id,
            label: &gap.label,
            key,
            old_value: &gap.current_value,
            new_value: &gap.suggested_value,
        };
        tally(&mut summary, &item, apply_one(store, &item, LedgerOrigin::ApplyGap, now));
    }

    Ok(summary)
}

fn tally(summary: &mut ApplySummary, item: &Approved<'_>, result: Result<Outcome, StoreError>) {
    match result {
        Ok(Outcome::Applied) => summary.applied += 1,
        Ok(Outcome::MissingRecord) => {
            log::warn!("{} #{}: no canonical record for '{}', left unapplied", item.kind, item.id, item.label);
            summary.missing_record += 1;
        }
        Ok(Outcome::AlreadyApplied) => summary.already_applied += 1,
        Err(e) => {
            log::warn!("{} #{}: apply failed: {}", item.kind, item.id, e);
            summary.failed += 1;
        }
    }
}

/// Flip `applied` first; the record write and the ledger entry only
/// happen in the transaction that won the flip.
fn apply_one(
    store: &Store,
    item: &Approved<'_>,
    origin: LedgerOrigin,
    now: DateTime<Utc>,
) -> Result<Outcome, StoreError> {
    let uow = store.begin()?;

    let Some(mut record) = uow.get_record(item.label)? else {
        return Ok(Outcome::MissingRecord);
    };
    if !uow.mark_applied(item.kind, item.id)? {
        return Ok(Outcome::AlreadyApplied);
    }

    record.set_value(item.key, item.new_value, now);
    record.updated_at = now;
    uow.put_record(&record)?;
    uow.record_change(origin, item.label, Some(item.key), item.old_value, item.new_value, now)?;
    uow.commit()?;

    log::info!(
        "{} #{}: {}.{} = {:?}",
        item.kind,
        item.id,
        item.label,
        item.key,
        item.new_value
    );
    Ok(Outcome::Applied)
}
