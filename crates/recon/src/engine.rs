use chrono::{DateTime, Utc};
use geoquiz_core::{RawBinding, Snapshot};

use crate::merge::merge;
use crate::unify::unify;

/// A merged snapshot plus the diagnostics gathered while building it.
#[derive(Debug, Clone)]
pub struct SnapshotBuild {
    pub snapshot: Snapshot,
    /// Countries produced by each source after unification, in source order.
    pub per_source: Vec<usize>,
    /// Fields backfilled plus records appended across all merges.
    pub copied: usize,
}

/// Unify every source, then fold them into the first one.
///
/// Sources are given in priority order: the first is primary, each later
/// one only backfills what is still missing. Every record of the result
/// shares `taken_at`.
pub fn build_snapshot(sources: &[Vec<RawBinding>], taken_at: DateTime<Utc>) -> SnapshotBuild {
    let mut per_source = Vec::with_capacity(sources.len());
    let mut copied = 0usize;
    let mut countries = Vec::new();

    for (i, rows) in sources.iter().enumerate() {
        let unified = unify(rows);
        log::debug!(
            "source #{i}: {} row(s) unified into {} countries",
            rows.len(),
            unified.len()
        );
        per_source.push(unified.len());

        if i == 0 {
            countries = unified;
        } else {
            let outcome = merge(countries, &unified);
            copied += outcome.copied;
            countries = outcome.countries;
        }
    }

    log::info!(
        "snapshot built: {} countries from {} source(s), {} field(s)/record(s) copied",
        countries.len(),
        sources.len(),
        copied
    );

    SnapshotBuild {
        snapshot: Snapshot::new(taken_at, countries),
        per_source,
        copied,
    }
}
