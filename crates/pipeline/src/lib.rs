//! `geoquiz-pipeline`: The curation pipeline over a [`geoquiz_store::Store`].
//!
//! - [`seed`] fills an empty store from the configured sources
//! - [`suggest_disputes`] / [`suggest_gaps`] ask the completion service
//!   for values
//! - [`approve`] / [`bypass`] are the human decisions
//! - [`apply_approved`] writes approved values into canonical records
//! - [`Reconciler::resync`] refetches, prunes and diffs against live data
//! - [`cycle`] runs the batch sequence
//!
//! Every operation takes its timestamp from the caller. None of them take
//! the run lock; that is the caller's job.

mod apply;
mod cycle;
mod error;
mod gaps;
mod reconcile;
mod review;
mod seed;
mod sources;
mod suggest;

pub use apply::{apply_approved, apply_disputes, apply_gaps, ApplySummary};
pub use cycle::{cycle, CycleSummary};
pub use error::PipelineError;
pub use gaps::{register_gaps, GapRegistration};
pub use reconcile::{Reconciler, ResyncSummary};
pub use review::{approve, bypass, report_question};
pub use seed::{seed, SeedSummary};
pub use sources::{build_sources, fetch_snapshot};
pub use suggest::{suggest_disputes, suggest_gaps, SuggestSummary};
