//! `geoquiz-sparql-client`: Fetch raw country rows from knowledge graphs.
//!
//! [`SourceClient`] is the seam the pipeline depends on; [`SparqlSource`]
//! is the HTTP implementation. Tests substitute in-memory sources.

pub mod client;
pub mod error;

use geoquiz_core::RawBinding;

pub use client::{parse_bindings, RetryPolicy, SparqlSource, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_SECS};
pub use error::SourceError;

/// A source of raw fact rows.
pub trait SourceClient {
    /// Short name used in logs and errors (`wikidata`, `dbpedia`).
    fn name(&self) -> &str;

    /// Fetch every row. Any error aborts the fetch as a whole.
    fn fetch(&self) -> Result<Vec<RawBinding>, SourceError>;
}
