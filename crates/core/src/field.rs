//! The fixed country field set.
//!
//! Every per-field rule lives in one table keyed by [`FieldKey`]: the JSON
//! key of the persisted record, the "unknown" sentinel, the keyword that
//! identifies the field inside a free-text quiz question, and the prompt
//! template used to ask the completion service for a value. Suggestion and
//! apply both read from here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Placeholder stored when no flag image is known.
pub const NO_FLAG: &str = "./static/images/no_flag.png";

/// Placeholder stored when no anthem recording is known.
pub const NO_AUDIO: &str = "no_audio";

/// Token replaced by the country label when a prompt is rendered.
pub const COUNTRY_PLACEHOLDER: &str = "{country}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldKey {
    #[serde(rename = "country_label")]
    CountryLabel,
    #[serde(rename = "capital_label")]
    Capital,
    #[serde(rename = "currency_label")]
    Currency,
    #[serde(rename = "population")]
    Population,
    #[serde(rename = "flag_image")]
    Flag,
    #[serde(rename = "anthem_audio")]
    Anthem,
    #[serde(rename = "official_Language_label")]
    OfficialLanguage,
    #[serde(rename = "continent_label")]
    Continent,
    #[serde(rename = "highest_point_label")]
    HighestPoint,
}

/// Keyword → field, tested in order against the lowercased input.
/// First match wins, so "highest point" must stay ahead of any keyword
/// that could appear inside it.
const KEYWORD_TABLE: [(&str, FieldKey); 8] = [
    ("capital", FieldKey::Capital),
    ("currency", FieldKey::Currency),
    ("population", FieldKey::Population),
    ("language", FieldKey::OfficialLanguage),
    ("continent", FieldKey::Continent),
    ("highest point", FieldKey::HighestPoint),
    ("flag", FieldKey::Flag),
    ("anthem", FieldKey::Anthem),
];

impl FieldKey {
    /// Every key in persisted order, label first.
    pub const ALL: [FieldKey; 9] = [
        FieldKey::CountryLabel,
        FieldKey::Capital,
        FieldKey::Currency,
        FieldKey::Population,
        FieldKey::Flag,
        FieldKey::Anthem,
        FieldKey::OfficialLanguage,
        FieldKey::Continent,
        FieldKey::HighestPoint,
    ];

    /// Fact fields: merged across sources, scanned for gaps, diffed on resync.
    pub const TRACKED: [FieldKey; 8] = [
        FieldKey::Capital,
        FieldKey::Currency,
        FieldKey::Population,
        FieldKey::Flag,
        FieldKey::Anthem,
        FieldKey::OfficialLanguage,
        FieldKey::Continent,
        FieldKey::HighestPoint,
    ];

    pub fn json_key(&self) -> &'static str {
        match self {
            Self::CountryLabel => "country_label",
            Self::Capital => "capital_label",
            Self::Currency => "currency_label",
            Self::Population => "population",
            Self::Flag => "flag_image",
            Self::Anthem => "anthem_audio",
            Self::OfficialLanguage => "official_Language_label",
            Self::Continent => "continent_label",
            Self::HighestPoint => "highest_point_label",
        }
    }

    /// Parse a persisted JSON key. Case-insensitive: older rows spell the
    /// language key `official_language_label`.
    pub fn from_json_key(key: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.json_key().eq_ignore_ascii_case(key))
    }

    /// Value meaning "unknown" for this field.
    pub fn sentinel(&self) -> &'static str {
        match self {
            Self::Flag => NO_FLAG,
            Self::Anthem => NO_AUDIO,
            _ => "",
        }
    }

    /// Empty, or equal to the field's sentinel.
    pub fn is_missing(&self, value: &str) -> bool {
        value.is_empty() || value == self.sentinel()
    }

    /// Keyword used to recognise this field in free text.
    pub fn keyword(&self) -> Option<&'static str> {
        KEYWORD_TABLE
            .iter()
            .find(|(_, key)| key == self)
            .map(|(keyword, _)| *keyword)
    }

    /// Map a free-text question (or any text naming a field) to a field.
    pub fn from_text(text: &str) -> Option<Self> {
        let lowered = text.to_lowercase();
        KEYWORD_TABLE
            .iter()
            .find(|(keyword, _)| lowered.contains(keyword))
            .map(|(_, key)| *key)
    }

    /// Prompt template with a [`COUNTRY_PLACEHOLDER`]. `None` for the label.
    pub fn prompt_template(&self) -> Option<&'static str> {
        let template = match self {
            Self::CountryLabel => return None,
            Self::Capital => "What is the capital of (the) {country}, without abbreviations, commas, or periods? Give me the answer as currently as possible with only the capital name. If there is more than one, give me only the capital names separated by the word 'or'.",
            Self::Currency => "What is the currency of (the) {country}, without abbreviations, commas, or periods? Give me the answer as currently as possible with only the currency name. If there is more than one, give me only the currency names separated by the word 'or'.",
            Self::Population => "What is the exact numeric population of (the) {country} in digits, without abbreviations, commas, or periods? Give me the answer as currently as possible in digits; only one number.",
            Self::OfficialLanguage => "What is the official language of (the) {country}, without abbreviations, commas, or periods? Give me the answer as currently as possible with only the language name. If there is more than one, give me only the language names separated by the word 'or'.",
            Self::Continent => "Which continent does (the) {country} belong to? Without abbreviations, commas, or periods. Give me the answer as currently as possible with only the continent name. If there is more than one, give me only the continent names separated by the word 'or'.",
            Self::HighestPoint => "What is the highest point of (the) {country}, without abbreviations, commas, or periods? Give me the answer as currently as possible with only the highest point name. If there is more than one, give me only the highest point names separated by the word 'or'.",
            Self::Flag => "Provide one URL of the official flag as currently as possible of (the) {country}. This URL must refer to a web image file such as SVG, JPG, or PNG. Provide only the URL.",
            Self::Anthem => "Provide one URL of the official anthem as currently as possible of (the) {country}. This URL must refer to a web sound file such as OGG. Provide only the URL.",
        };
        Some(template)
    }

    /// Render the prompt for one country.
    pub fn prompt_for(&self, country: &str) -> Option<String> {
        self.prompt_template()
            .map(|t| t.replace(COUNTRY_PLACEHOLDER, country))
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.json_key())
    }
}

impl FromStr for FieldKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_json_key(s).ok_or_else(|| format!("unknown field key: {s}"))
    }
}
