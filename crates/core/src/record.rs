use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::field::FieldKey;

// ---------------------------------------------------------------------------
// Snapshot side
// ---------------------------------------------------------------------------

/// Facts for one country as seen by a source snapshot.
///
/// Absent fields read as empty. After [`CountryFacts::with_defaults`] every
/// field is present, holding either a real value or its sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryFacts {
    pub label: String,
    pub fields: BTreeMap<FieldKey, String>,
}

impl CountryFacts {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: FieldKey, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn value(&self, key: FieldKey) -> &str {
        if key == FieldKey::CountryLabel {
            return &self.label;
        }
        self.fields.get(&key).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, key: FieldKey, value: impl Into<String>) {
        if key == FieldKey::CountryLabel {
            self.label = value.into();
        } else {
            self.fields.insert(key, value.into());
        }
    }

    pub fn is_missing(&self, key: FieldKey) -> bool {
        key.is_missing(self.value(key))
    }

    /// Fill every absent or empty tracked field with its sentinel.
    pub fn with_defaults(mut self) -> Self {
        for key in FieldKey::TRACKED {
            let entry = self.fields.entry(key).or_default();
            if entry.is_empty() {
                *entry = key.sentinel().to_string();
            }
        }
        self
    }

    /// `(key, value)` for the label and every present field, persisted order.
    pub fn entries(&self) -> impl Iterator<Item = (FieldKey, &str)> + '_ {
        FieldKey::ALL
            .into_iter()
            .filter(move |k| *k == FieldKey::CountryLabel || self.fields.contains_key(k))
            .map(move |k| (k, self.value(k)))
    }

    /// Canonical persisted shape: `{"<field>": {"value": "<string>"}}`.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (key, value) in self.entries() {
            map.insert(key.json_key().to_string(), value_object(value));
        }
        Value::Object(map)
    }
}

/// One merged fetch, every record tagged with the same timestamp.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    pub countries: Vec<CountryFacts>,
}

impl Snapshot {
    pub fn new(taken_at: DateTime<Utc>, countries: Vec<CountryFacts>) -> Self {
        Self { taken_at, countries }
    }

    pub fn labels(&self) -> BTreeSet<String> {
        self.countries.iter().map(|c| c.label.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Canonical side
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    pub value: String,
    /// Time of the snapshot or review that produced the value, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,
}

impl FieldValue {
    pub fn new(value: impl Into<String>, observed_at: Option<DateTime<Utc>>) -> Self {
        Self {
            value: value.into(),
            observed_at,
        }
    }
}

/// The authoritative fact set for one country.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryRecord {
    pub label: String,
    pub fields: BTreeMap<FieldKey, FieldValue>,
    /// Freshness timestamp compared against incoming snapshots.
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// Persisted data is not a JSON object.
    NotAnObject { label: String },
    /// Persisted data is not valid JSON.
    Json { label: String, message: String },
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject { label } => write!(f, "record '{label}': data is not a JSON object"),
            Self::Json { label, message } => write!(f, "record '{label}': invalid JSON: {message}"),
        }
    }
}

impl std::error::Error for RecordError {}

impl CountryRecord {
    pub fn from_facts(facts: &CountryFacts, at: DateTime<Utc>) -> Self {
        let fields = facts
            .entries()
            .map(|(key, value)| (key, FieldValue::new(value, Some(at))))
            .collect();
        Self {
            label: facts.label.clone(),
            fields,
            updated_at: at,
        }
    }

    /// Current value; absent fields read as empty.
    pub fn value(&self, key: FieldKey) -> &str {
        self.fields.get(&key).map(|f| f.value.as_str()).unwrap_or("")
    }

    /// Set a field, creating it if absent. Returns the previous value.
    pub fn set_value(&mut self, key: FieldKey, value: impl Into<String>, at: DateTime<Utc>) -> String {
        let previous = self.value(key).to_string();
        self.fields.insert(key, FieldValue::new(value, Some(at)));
        previous
    }

    /// Canonical persisted shape, `{value}` only.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (key, field) in &self.fields {
            map.insert(key.json_key().to_string(), value_object(&field.value));
        }
        Value::Object(map)
    }

    pub fn to_json_string(&self) -> String {
        self.to_json().to_string()
    }

    /// Read the persisted shape. Accepts `{"value": ...}` objects and bare
    /// strings; unknown keys are dropped.
    pub fn from_json(label: &str, data: &Value, updated_at: DateTime<Utc>) -> Result<Self, RecordError> {
        let map = data.as_object().ok_or_else(|| RecordError::NotAnObject {
            label: label.to_string(),
        })?;

        let mut fields = BTreeMap::new();
        for (raw_key, raw_value) in map {
            let Some(key) = FieldKey::from_json_key(raw_key) else {
                continue;
            };
            let value = match raw_value {
                Value::String(s) => s.clone(),
                Value::Object(obj) => match obj.get("value") {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                },
                Value::Null => String::new(),
                other => other.to_string(),
            };
            fields.insert(key, FieldValue::new(value, None));
        }
        fields
            .entry(FieldKey::CountryLabel)
            .or_insert_with(|| FieldValue::new(label, None));

        Ok(Self {
            label: label.to_string(),
            fields,
            updated_at,
        })
    }

    pub fn from_json_str(label: &str, data: &str, updated_at: DateTime<Utc>) -> Result<Self, RecordError> {
        if data.trim().is_empty() {
            return Self::from_json(label, &Value::Object(Map::new()), updated_at);
        }
        let value: Value = serde_json::from_str(data).map_err(|e| RecordError::Json {
            label: label.to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(label, &value, updated_at)
    }
}

fn value_object(value: &str) -> Value {
    let mut inner = Map::new();
    inner.insert("value".to_string(), Value::String(value.to_string()));
    Value::Object(inner)
}
