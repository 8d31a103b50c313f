use std::collections::{BTreeMap, HashSet};

use geoquiz_core::{CountryFacts, FieldKey};
use serde::Serialize;

/// One missing field on one country: the identity of a gap review.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GapCandidate {
    pub label: String,
    pub key: FieldKey,
    /// Value held when the gap was detected; empty or the field sentinel.
    pub current_value: String,
}

/// Every missing `(label, field, current value)` triple, in dataset order.
///
/// Repeated triples (a label present twice) are reported once.
pub fn detect_gaps(countries: &[CountryFacts]) -> Vec<GapCandidate> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for facts in countries {
        for key in FieldKey::TRACKED {
            let value = facts.value(key);
            if !key.is_missing(value) {
                continue;
            }
            let candidate = GapCandidate {
                label: facts.label.clone(),
                key,
                current_value: value.to_string(),
            };
            if seen.insert(candidate.clone()) {
                out.push(candidate);
            }
        }
    }

    out
}

/// Gap counts per field, for diagnostics.
pub fn count_by_field(gaps: &[GapCandidate]) -> BTreeMap<FieldKey, usize> {
    let mut counts = BTreeMap::new();
    for gap in gaps {
        *counts.entry(gap.key).or_insert(0) += 1;
    }
    counts
}
