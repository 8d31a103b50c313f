use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use geoquiz_core::{CountryFacts, FieldKey};
use geoquiz_recon::{count_by_field, detect_gaps};
use geoquiz_store::Store;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GapRegistration {
    /// Missing (label, field, value) triples in the dataset.
    pub detected: usize,
    /// New pending reviews created by this run.
    pub registered: usize,
    /// Countries whose gaps could not be stored.
    pub failed: usize,
    pub by_field: BTreeMap<FieldKey, usize>,
}

/// Register a pending gap review for every missing field not already
/// queued with the same current value. Safe to rerun on unchanged data.
///
/// One unit of work per country; a failing country is logged and skipped.
pub fn register_gaps(store: &Store, countries: &[CountryFacts], at: DateTime<Utc>) -> GapRegistration {
    let candidates = detect_gaps(countries);
    let mut summary = GapRegistration {
        detected: candidates.len(),
        by_field: count_by_field(&candidates),
        ..GapRegistration::default()
    };

    for group in candidates.chunk_by(|a, b| a.label == b.label) {
        let label = &group[0].label;
        let result = store.begin().and_then(|uow| {
            let mut inserted = 0;
            for gap in group {
                if uow.insert_gap_if_absent(&gap.label, gap.key, &gap.current_value, at)? {
                    inserted += 1;
                }
            }
            uow.commit()?;
            Ok(inserted)
        });

        match result {
            Ok(n) => summary.registered += n,
            Err(e) => {
                log::warn!("{}: could not register gaps: {}", label, e);
                summary.failed += 1;
            }
        }
    }

    for (key, n) in &summary.by_field {
        log::debug!("gaps: {} missing {}", n, key);
    }
    log::info!(
        "gaps: {} detected, {} newly registered",
        summary.detected,
        summary.registered
    );
    summary
}
