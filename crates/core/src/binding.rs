use std::collections::BTreeMap;

use serde_json::Value;

use crate::field::FieldKey;
use crate::record::CountryFacts;

/// One row of a knowledge-graph query result, field name → value.
///
/// A source may return several rows for the same country when an attribute
/// has more than one value; [`crate::record::CountryFacts`] are built from
/// these only after unification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawBinding {
    values: BTreeMap<String, String>,
}

impl RawBinding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Non-empty country label, if the row carries one.
    pub fn label(&self) -> Option<&str> {
        self.get(FieldKey::CountryLabel.json_key())
            .map(str::trim)
            .filter(|l| !l.is_empty())
    }

    /// Parse one SPARQL JSON result row: `{"field": {"type": ..., "value": ...}}`.
    /// Returns `None` when the row is not an object.
    pub fn from_sparql_row(row: &Value) -> Option<Self> {
        let obj = row.as_object()?;
        let mut values = BTreeMap::new();
        for (key, cell) in obj {
            let value = match cell {
                Value::Object(inner) => match inner.get("value") {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                },
                Value::String(s) => s.clone(),
                _ => continue,
            };
            values.insert(key.clone(), value);
        }
        Some(Self { values })
    }

    /// Known fields only, with sentinels filled for absent ones.
    /// `None` when the row has no label.
    pub fn to_facts(&self) -> Option<CountryFacts> {
        let label = self.label()?;
        let mut facts = CountryFacts::new(label);
        for key in FieldKey::TRACKED {
            if let Some(value) = self.get(key.json_key()) {
                facts.set(key, value.trim());
            }
        }
        Some(facts.with_defaults())
    }
}
