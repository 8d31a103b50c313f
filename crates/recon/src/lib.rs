//! `geoquiz-recon`: Pure reconciliation engine.
//!
//! Collapses per-source query rows into one record per country, merges
//! sources by priority, finds missing fields and plans resync mutations.
//! No IO: the pipeline crate feeds it fetched rows and stored records.

pub mod diff;
pub mod engine;
pub mod gaps;
pub mod merge;
pub mod unify;

pub use diff::{apply_changes, diff_record, orphaned, vanished, FieldChange, RecordPlan};
pub use engine::{build_snapshot, SnapshotBuild};
pub use gaps::{count_by_field, detect_gaps, GapCandidate};
pub use merge::{merge, MergeOutcome};
pub use unify::{join_disjunction, unify};
