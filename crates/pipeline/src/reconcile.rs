//! Full resync of the canonical store against live upstream data.
//!
//! ## Order of a run
//!
//! 1. Fetch and merge every source. Any failure, or an empty snapshot,
//!    ends the run here with nothing mutated.
//! 2. Register gaps found in the snapshot.
//! 3. Prune: drop tracking rows for countries the sources no longer
//!    return, then canonical records no longer backed by a live source.
//! 4. Per snapshot country: upsert its tracking row, then insert it or
//!    apply the accepted field changes. A field written here closes its
//!    open gap reviews, approved ones included.
//! 5. Apply the approved reviews still unapplied. This runs after the
//!    diff so that applying cannot stamp a record with the snapshot time
//!    and turn its live changes stale.
//!
//! Each entity is its own unit of work. The run as a whole is not atomic:
//! a failing entity is logged, counted and skipped.

use chrono::{DateTime, Utc};
use geoquiz_core::{CountryFacts, CountryRecord, Snapshot};
use geoquiz_recon::{apply_changes, diff_record, orphaned, vanished, RecordPlan};
use geoquiz_sparql_client::SourceClient;
use geoquiz_store::{LedgerOrigin, Store, StoreError};
use serde::Serialize;

use crate::apply::{apply_approved, ApplySummary};
use crate::error::PipelineError;
use crate::gaps::{register_gaps, GapRegistration};
use crate::sources::fetch_snapshot;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResyncSummary {
    pub taken_at: Option<DateTime<Utc>>,
    pub countries: usize,
    /// Countries per source after unification, in priority order.
    pub per_source: Vec<usize>,
    /// Fields backfilled plus records appended by the merge.
    pub copied: usize,
    pub applied: ApplySummary,
    pub gaps: GapRegistration,
    pub pruned_sources: usize,
    pub pruned_records: usize,
    pub inserted: usize,
    pub updated: usize,
    pub fields_changed: usize,
    pub unchanged: usize,
    /// Records with differing fields that the snapshot was not newer than.
    pub stale: usize,
    /// Open gap reviews closed because the source now supplies the field.
    pub gaps_closed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

enum CountryOutcome {
    Inserted,
    Updated { fields: usize, gaps_closed: usize },
    Unchanged,
    Stale,
}

pub struct Reconciler<'a> {
    store: &'a Store,
    sources: &'a [Box<dyn SourceClient>],
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a Store, sources: &'a [Box<dyn SourceClient>]) -> Self {
        Self { store, sources }
    }

    /// One full resync. Every record written carries `now` as its
    /// freshness timestamp.
    pub fn resync(&self, now: DateTime<Utc>) -> Result<ResyncSummary, PipelineError> {
        let build = fetch_snapshot(self.sources, now)?;
        let snapshot = build.snapshot;

        let mut summary = ResyncSummary {
            taken_at: Some(snapshot.taken_at),
            countries: snapshot.countries.len(),
            per_source: build.per_source,
            copied: build.copied,
            ..ResyncSummary::default()
        };

        summary.gaps = register_gaps(self.store, &snapshot.countries, now);

        self.prune(&snapshot, &mut summary)?;

        for facts in &snapshot.countries {
            match self.sync_country(facts, snapshot.taken_at) {
                Ok(outcome) => {
                    summary.succeeded += 1;
                    match outcome {
                        CountryOutcome::Inserted => summary.inserted += 1,
                        CountryOutcome::Updated { fields, gaps_closed } => {
                            summary.updated += 1;
                            summary.fields_changed += fields;
                            summary.gaps_closed += gaps_closed;
                        }
                        CountryOutcome::Unchanged => summary.unchanged += 1,
                        CountryOutcome::Stale => summary.stale += 1,
                    }
                }
                Err(e) => {
                    log::warn!("{}: resync failed: {}", facts.label, e);
                    summary.failed += 1;
                }
            }
        }

        summary.applied = apply_approved(self.store, now)?;

        log::info!(
            "resync: {} countries, {} inserted, {} updated ({} fields), {} stale, {} pruned, {} failed",
            summary.countries,
            summary.inserted,
            summary.updated,
            summary.fields_changed,
            summary.stale,
            summary.pruned_records,
            summary.failed
        );
        Ok(summary)
    }

    fn prune(&self, snapshot: &Snapshot, summary: &mut ResyncSummary) -> Result<(), PipelineError> {
        let fresh = snapshot.labels();
        let at = snapshot.taken_at;

        for label in vanished(&self.store.tracked_labels()?, &fresh) {
            let result = self.store.begin().and_then(|uow| {
                uow.delete_tracked(&label)?;
                uow.record_change(LedgerOrigin::SourceRemoved, &label, None, "", "", at)?;
                uow.commit()
            });
            match result {
                Ok(()) => {
                    log::info!("{}: no longer returned by any source", label);
                    summary.pruned_sources += 1;
                    summary.succeeded += 1;
                }
                Err(e) => {
                    log::warn!("{}: could not drop tracking row: {}", label, e);
                    summary.failed += 1;
                }
            }
        }

        let mut backed = self.store.tracked_labels()?;
        backed.extend(fresh);

        for label in orphaned(&self.store.record_labels()?, &backed) {
            let result = self.store.begin().and_then(|uow| {
                let old = uow
                    .get_record(&label)?
                    .map(|r| r.to_json_string())
                    .unwrap_or_default();
                uow.delete_record(&label)?;
                uow.record_change(LedgerOrigin::QuizRemoved, &label, None, &old, "", at)?;
                uow.commit()
            });
            match result {
                Ok(()) => {
                    log::info!("{}: removed from the quiz", label);
                    summary.pruned_records += 1;
                    summary.succeeded += 1;
                }
                Err(e) => {
                    log::warn!("{}: could not remove record: {}", label, e);
                    summary.failed += 1;
                }
            }
        }

        Ok(())
    }

    fn sync_country(&self, facts: &CountryFacts, taken_at: DateTime<Utc>) -> Result<CountryOutcome, StoreError> {
        let uow = self.store.begin()?;
        uow.upsert_tracked(facts, taken_at)?;

        let existing = uow.get_record(&facts.label)?;
        let outcome = match (diff_record(existing.as_ref(), facts, taken_at), existing) {
            (RecordPlan::Insert, _) => {
                let record = CountryRecord::from_facts(facts, taken_at);
                uow.put_record(&record)?;
                for (key, value) in facts.entries() {
                    uow.record_change(LedgerOrigin::NewCountry, &facts.label, Some(key), "", value, taken_at)?;
                }
                log::info!("{}: new country", facts.label);
                CountryOutcome::Inserted
            }
            (RecordPlan::Update(changes), Some(mut record)) => {
                apply_changes(&mut record, &changes, taken_at);
                uow.put_record(&record)?;

                let mut gaps_closed = 0;
                for change in &changes {
                    uow.record_change(
                        LedgerOrigin::DataUpdated,
                        &facts.label,
                        Some(change.key),
                        &change.old_value,
                        &change.new_value,
                        taken_at,
                    )?;
                    gaps_closed += uow.close_open_gaps(&facts.label, change.key)?;
                }
                log::info!("{}: {} field(s) updated", facts.label, changes.len());
                CountryOutcome::Updated {
                    fields: changes.len(),
                    gaps_closed,
                }
            }
            (RecordPlan::Stale { skipped }, _) => {
                log::debug!("{}: {} differing field(s) not newer than the record", facts.label, skipped);
                CountryOutcome::Stale
            }
            (RecordPlan::Unchanged, _) | (RecordPlan::Update(_), None) => CountryOutcome::Unchanged,
        };

        uow.commit()?;
        Ok(outcome)
    }
}
