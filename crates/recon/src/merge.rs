use std::collections::HashMap;

use geoquiz_core::{CountryFacts, FieldKey};

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub countries: Vec<CountryFacts>,
    /// Fields backfilled plus records appended. Diagnostics only.
    pub copied: usize,
}

/// Backfill `primary` from `secondary`.
///
/// A field is copied only when it is missing in primary and present in
/// secondary; primary wins whenever both have a value. Countries unknown
/// to primary are appended whole, after all primary countries.
pub fn merge(primary: Vec<CountryFacts>, secondary: &[CountryFacts]) -> MergeOutcome {
    let mut countries = primary;
    let mut index: HashMap<String, usize> = countries
        .iter()
        .enumerate()
        .map(|(i, c)| (c.label.clone(), i))
        .collect();
    let mut copied = 0usize;

    for other in secondary {
        match index.get(&other.label).copied() {
            Some(pos) => {
                let target = &mut countries[pos];
                for key in FieldKey::TRACKED {
                    if !other.is_missing(key) && target.is_missing(key) {
                        target.set(key, other.value(key));
                        copied += 1;
                    }
                }
            }
            None => {
                index.insert(other.label.clone(), countries.len());
                countries.push(other.clone());
                copied += 1;
            }
        }
    }

    MergeOutcome { countries, copied }
}
