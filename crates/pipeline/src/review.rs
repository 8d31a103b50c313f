//! Human-triggered review transitions and question reports.

use chrono::{DateTime, Utc};
use geoquiz_store::{Decision, NewDispute, ReviewKind, ReviewState, Store, StoreError, UnitOfWork};

use crate::error::PipelineError;

/// Approve a review that carries a suggestion.
pub fn approve(store: &Store, kind: ReviewKind, id: i64) -> Result<(), PipelineError> {
    transition(store, kind, id, "approve", |uow| uow.approve(kind, id))
}

/// Dismiss a review. Terminal; the canonical store is not touched.
pub fn bypass(store: &Store, kind: ReviewKind, id: i64) -> Result<(), PipelineError> {
    transition(store, kind, id, "bypass", |uow| uow.bypass(kind, id))
}

fn transition<F>(store: &Store, kind: ReviewKind, id: i64, verb: &str, op: F) -> Result<(), PipelineError>
where
    F: FnOnce(&UnitOfWork<'_>) -> Result<bool, StoreError>,
{
    let uow = store.begin()?;
    if op(&uow)? {
        uow.commit()?;
        log::info!("{} #{}: {} accepted", kind, id, verb);
        return Ok(());
    }
    drop(uow);

    let state = store
        .review_state(kind, id)?
        .ok_or(PipelineError::ReviewNotFound { kind, id })?;
    Err(PipelineError::InvalidTransition {
        kind,
        id,
        reason: format!("cannot {}: {}", verb, describe(&state)),
    })
}

fn describe(state: &ReviewState) -> &'static str {
    if state.applied {
        return "already applied";
    }
    match state.decision {
        Decision::Approved => "already approved",
        Decision::Bypassed => "already bypassed",
        Decision::Pending if state.suggested_value.is_empty() => "no suggestion yet",
        Decision::Pending => "still pending",
    }
}

/// Record a quiz taker's challenge to a displayed answer.
pub fn report_question(store: &Store, report: &NewDispute, at: DateTime<Utc>) -> Result<i64, PipelineError> {
    if report.label.trim().is_empty() {
        return Err(PipelineError::Invalid("country label must not be empty".to_string()));
    }
    if report.question.trim().is_empty() {
        return Err(PipelineError::Invalid("question must not be empty".to_string()));
    }

    let uow = store.begin()?;
    let id = uow.create_dispute(report, at)?;
    uow.commit()?;
    log::info!("dispute #{} reported by {} on {}", id, report.reporter, report.label);
    Ok(id)
}
