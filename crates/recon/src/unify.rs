use std::collections::hash_map::Entry;
use std::collections::{btree_map, BTreeMap, HashMap};

use geoquiz_core::{CountryFacts, FieldKey, RawBinding};

/// Separator between alternatives in a rendered multi-value field.
pub const VALUE_SEPARATOR: &str = ", ";

/// Values seen for one field of one country, in first-appearance order.
#[derive(Debug)]
struct FieldValues {
    first: String,
    pieces: Vec<String>,
    /// Set once a second row contributed to this field.
    coalesced: bool,
}

impl FieldValues {
    fn new(value: &str) -> Self {
        Self {
            first: value.to_string(),
            pieces: value.split(VALUE_SEPARATOR).map(str::to_string).collect(),
            coalesced: false,
        }
    }

    fn add(&mut self, value: &str) {
        self.coalesced = true;
        if !self.pieces.iter().any(|p| p == value) {
            self.pieces.push(value.to_string());
        }
    }

    fn render(self) -> String {
        if self.coalesced {
            join_disjunction(&self.pieces)
        } else {
            self.first
        }
    }
}

/// Collapse one source's rows into one record per country.
///
/// Rows are grouped by label; the first row of a label fixes its position
/// in the output. A field holding several distinct values across rows is
/// rendered as a disjunction (`"A, B or C"`) in first-appearance order.
/// Empty and sentinel values never count as a value. Rows without a label
/// are dropped.
pub fn unify(bindings: &[RawBinding]) -> Vec<CountryFacts> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, BTreeMap<FieldKey, FieldValues>> = HashMap::new();
    let mut dropped = 0usize;

    for binding in bindings {
        let Some(facts) = binding.to_facts() else {
            dropped += 1;
            continue;
        };

        let group = match groups.entry(facts.label.clone()) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                order.push(facts.label.clone());
                e.insert(BTreeMap::new())
            }
        };

        for key in FieldKey::TRACKED {
            let value = facts.value(key);
            if key.is_missing(value) {
                continue;
            }
            match group.entry(key) {
                btree_map::Entry::Vacant(e) => {
                    e.insert(FieldValues::new(value));
                }
                btree_map::Entry::Occupied(mut e) => e.get_mut().add(value),
            }
        }
    }

    if dropped > 0 {
        log::warn!("unify: dropped {dropped} row(s) without a country label");
    }

    order
        .into_iter()
        .map(|label| {
            let fields = groups.remove(&label).unwrap_or_default();
            let mut facts = CountryFacts::new(label);
            for (key, values) in fields {
                facts.set(key, values.render());
            }
            facts.with_defaults()
        })
        .collect()
}

/// `["A"]` → `"A"`, `["A", "B"]` → `"A or B"`, `["A", "B", "C"]` → `"A, B or C"`.
pub fn join_disjunction(values: &[String]) -> String {
    match values.split_last() {
        None => String::new(),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} or {}", rest.join(VALUE_SEPARATOR), last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoquiz_core::NO_FLAG;
    use proptest::prelude::*;

    fn row(label: &str, key: &str, value: &str) -> RawBinding {
        RawBinding::new().with("country_label", label).with(key, value)
    }

    #[test]
    fn duplicate_values_collapse() {
        let rows = vec![
            row("Bolivia", "capital_label", "Sucre"),
            row("Bolivia", "capital_label", "Sucre"),
            row("Bolivia", "capital_label", "La Paz"),
        ];
        let out = unify(&rows);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value(FieldKey::Capital), "Sucre or La Paz");
    }

    #[test]
    fn three_values_render_as_list() {
        let rows = vec![
            row("South Africa", "capital_label", "Pretoria"),
            row("South Africa", "capital_label", "Cape Town"),
            row("South Africa", "capital_label", "Bloemfontein"),
        ];
        let out = unify(&rows);
        assert_eq!(
            out[0].value(FieldKey::Capital),
            "Pretoria, Cape Town or Bloemfontein"
        );
    }

    #[test]
    fn first_appearance_order_not_sorted() {
        let rows = vec![
            row("X", "currency_label", "Zloty"),
            row("X", "currency_label", "Amber"),
        ];
        assert_eq!(unify(&rows)[0].value(FieldKey::Currency), "Zloty or Amber");
    }

    #[test]
    fn countries_keep_first_seen_order() {
        let rows = vec![
            row("Peru", "capital_label", "Lima"),
            row("Chad", "capital_label", "N'Djamena"),
            row("Peru", "population", "34000000"),
        ];
        let out = unify(&rows);
        let labels: Vec<_> = out.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, ["Peru", "Chad"]);
        assert_eq!(out[0].value(FieldKey::Population), "34000000");
    }

    #[test]
    fn later_row_fills_unset_field() {
        let rows = vec![
            RawBinding::new().with("country_label", "Norway"),
            row("Norway", "flag_image", "https://example.org/no.svg"),
        ];
        let out = unify(&rows);
        assert_eq!(out[0].value(FieldKey::Flag), "https://example.org/no.svg");
    }

    #[test]
    fn missing_fields_keep_sentinels() {
        let out = unify(&[row("Norway", "flag_image", "")]);
        assert_eq!(out[0].value(FieldKey::Flag), NO_FLAG);
        assert_eq!(out[0].value(FieldKey::Capital), "");
    }

    #[test]
    fn single_row_value_is_verbatim() {
        let out = unify(&[row("X", "official_Language_label", "French, Arabic")]);
        assert_eq!(out[0].value(FieldKey::OfficialLanguage), "French, Arabic");
    }

    #[test]
    fn rows_without_label_are_skipped() {
        let rows = vec![
            RawBinding::new().with("capital_label", "Nowhere"),
            row("Peru", "capital_label", "Lima"),
        ];
        assert_eq!(unify(&rows).len(), 1);
    }

    proptest! {
        #[test]
        fn disjunction_preserves_first_appearance(values in prop::collection::vec("[a-z]{1,6}", 1..8)) {
            let rows: Vec<_> = values.iter().map(|v| row("Land", "capital_label", v)).collect();
            let out = unify(&rows);

            let mut expected: Vec<String> = Vec::new();
            for v in &values {
                if !expected.contains(v) {
                    expected.push(v.clone());
                }
            }
            prop_assert_eq!(out.len(), 1);
            prop_assert_eq!(out[0].value(FieldKey::Capital), join_disjunction(&expected));
        }
    }
}
