use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use geoquiz_core::{CountryFacts, CountryRecord, FieldKey};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Prune sets
// ---------------------------------------------------------------------------

/// Labels tracked as live before this run but absent from the new snapshot.
pub fn vanished(known: &BTreeSet<String>, fresh: &BTreeSet<String>) -> Vec<String> {
    known.difference(fresh).cloned().collect()
}

/// Canonical labels no longer backed by any live-source row.
pub fn orphaned(canonical: &BTreeSet<String>, backed: &BTreeSet<String>) -> Vec<String> {
    canonical.difference(backed).cloned().collect()
}

// ---------------------------------------------------------------------------
// Field diff
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub key: FieldKey,
    pub old_value: String,
    pub new_value: String,
}

/// What a resync should do with one snapshot record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordPlan {
    /// No canonical record yet.
    Insert,
    /// Accepted field changes, in field order.
    Update(Vec<FieldChange>),
    Unchanged,
    /// Fields differ but the snapshot is not newer than the record.
    Stale { skipped: usize },
}

/// Compare one snapshot record against its canonical counterpart.
///
/// A field changes only when the incoming value is a real value (not empty,
/// not the field's sentinel), differs from the stored one, and the snapshot
/// was taken strictly after the record's freshness timestamp. Equal
/// timestamps never overwrite.
pub fn diff_record(
    existing: Option<&CountryRecord>,
    incoming: &CountryFacts,
    taken_at: DateTime<Utc>,
) -> RecordPlan {
    let Some(existing) = existing else {
        return RecordPlan::Insert;
    };

    let changes: Vec<FieldChange> = FieldKey::TRACKED
        .into_iter()
        .filter_map(|key| {
            let new_value = incoming.value(key);
            if key.is_missing(new_value) {
                return None;
            }
            let old_value = existing.value(key);
            (old_value != new_value).then(|| FieldChange {
                key,
                old_value: old_value.to_string(),
                new_value: new_value.to_string(),
            })
        })
        .collect();

    if changes.is_empty() {
        RecordPlan::Unchanged
    } else if taken_at > existing.updated_at {
        RecordPlan::Update(changes)
    } else {
        RecordPlan::Stale {
            skipped: changes.len(),
        }
    }
}

/// Write accepted changes and bump the record's freshness timestamp.
pub fn apply_changes(record: &mut CountryRecord, changes: &[FieldChange], at: DateTime<Utc>) {
    for change in changes {
        record.set_value(change.key, change.new_value.as_str(), at);
    }
    if !changes.is_empty() {
        record.updated_at = at;
    }
}
