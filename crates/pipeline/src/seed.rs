use chrono::{DateTime, Utc};
use geoquiz_core::{CountryFacts, CountryRecord};
use geoquiz_sparql_client::SourceClient;
use geoquiz_store::{LedgerOrigin, Store, StoreError};
use serde::Serialize;

use crate::error::PipelineError;
use crate::gaps::{register_gaps, GapRegistration};
use crate::sources::fetch_snapshot;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    /// False when the store already held countries.
    pub seeded: bool,
    /// Canonical records present before the run.
    pub existing: usize,
    pub inserted: usize,
    pub failed: usize,
    pub per_source: Vec<usize>,
    pub copied: usize,
    pub gaps: GapRegistration,
}

/// Populate an empty store from the sources: canonical record, tracking
/// row and one ledger entry per field for every country, then gap
/// registration. A store that already has records is left alone.
pub fn seed(store: &Store, sources: &[Box<dyn SourceClient>], now: DateTime<Utc>) -> Result<SeedSummary, PipelineError> {
    let existing = store.count_records()?;
    if existing > 0 {
        log::info!("store already holds {} countries, nothing to seed", existing);
        return Ok(SeedSummary {
            existing,
            ..SeedSummary::default()
        });
    }

    let build = fetch_snapshot(sources, now)?;
    let mut summary = SeedSummary {
        seeded: true,
        per_source: build.per_source,
        copied: build.copied,
        ..SeedSummary::default()
    };

    for facts in &build.snapshot.countries {
        match seed_country(store, facts, now) {
            Ok(()) => summary.inserted += 1,
            Err(e) => {
                log::warn!("{}: seed failed: {}", facts.label, e);
                summary.failed += 1;
            }
        }
    }

    summary.gaps = register_gaps(store, &build.snapshot.countries, now);
    log::info!("seeded {} countries ({} failed)", summary.inserted, summary.failed);
    Ok(summary)
}

fn seed_country(store: &Store, facts: &CountryFacts, now: DateTime<Utc>) -> Result<(), StoreError> {
    let uow = store.begin()?;
    uow.put_record(&CountryRecord::from_facts(facts, now))?;
    uow.upsert_tracked(facts, now)?;
    for (key, value) in facts.entries() {
        uow.record_change(LedgerOrigin::Seed, &facts.label, Some(key), "", value, now)?;
    }
    uow.commit()
}
