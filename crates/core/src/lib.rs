//! `geoquiz-core`: The country fact model shared by every crate.
//!
//! One entity type with a fixed field set. No IO.

pub mod binding;
pub mod field;
pub mod record;

pub use binding::RawBinding;
pub use field::{FieldKey, COUNTRY_PLACEHOLDER, NO_AUDIO, NO_FLAG};
pub use record::{CountryFacts, CountryRecord, FieldValue, RecordError, Snapshot};
