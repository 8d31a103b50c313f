//! Suggestion pass: ask the completion service for a value for every
//! review item that has none yet.
//!
//! The field is chosen by keyword (disputes) or by the stored field key
//! (gaps), then the field's prompt template is rendered for the country.
//! Items without a template are skipped and stay pending. A failed
//! completion leaves the item pending for the next pass. Suggestions are
//! written with a compare-and-set on the empty value, so reruns and
//! concurrent passes never overwrite one another.

use geoquiz_ai_client::CompletionService;
use geoquiz_core::FieldKey;
use geoquiz_store::{ReviewKind, Store};
use serde::Serialize;

use crate::error::PipelineError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SuggestSummary {
    pub kind: &'static str,
    pub considered: usize,
    pub suggested: usize,
    /// No prompt template matched; left pending.
    pub no_template: usize,
    /// Completion or store failure; left pending.
    pub failed: usize,
    /// Someone else filled the suggestion first.
    pub superseded: usize,
}

struct Candidate {
    id: i64,
    label: String,
    key: Option<FieldKey>,
}

/// Suggest values for disputes with an empty suggestion.
pub fn suggest_disputes(store: &Store, service: &dyn CompletionService) -> Result<SuggestSummary, PipelineError> {
    let candidates = store
        .disputes_needing_suggestion()?
        .into_iter()
        .map(|d| Candidate {
            id: d.id,
            key: FieldKey::from_text(&d.question),
            label: d.label,
        })
        .collect::<Vec<_>>();
    Ok(run(store, service, ReviewKind::Dispute, candidates))
}

/// Suggest values for gaps with an empty suggestion.
pub fn suggest_gaps(store: &Store, service: &dyn CompletionService) -> Result<SuggestSummary, PipelineError> {
    let candidates = store
        .gaps_needing_suggestion()?
        .into_iter()
        .map(|g| Candidate {
            id: g.id,
            key: g.key(),
            label: g.label,
        })
        .collect::<Vec<_>>();
    Ok(run(store, service, ReviewKind::Gap, candidates))
}

fn run(
    store: &Store,
    service: &dyn CompletionService,
    kind: ReviewKind,
    candidates: Vec<Candidate>,
) -> SuggestSummary {
    let mut summary = SuggestSummary {
        kind: kind.as_str(),
        considered: candidates.len(),
        ..SuggestSummary::default()
    };

    for item in candidates {
        let Some(prompt) = item.key.and_then(|k| k.prompt_for(&item.label)) else {
            log::debug!("{} #{}: no prompt template, left pending", kind, item.id);
            summary.no_template += 1;
            continue;
        };

        let answer = match service.complete(&prompt) {
            Ok(answer) if !answer.trim().is_empty() => answer.trim().to_string(),
            Ok(_) => {
                log::warn!("{} #{} ({}): empty suggestion", kind, item.id, item.label);
                summary.failed += 1;
                continue;
            }
            Err(e) => {
                log::warn!("{} #{} ({}): suggestion failed: {}", kind, item.id, item.label, e);
                summary.failed += 1;
                continue;
            }
        };

        let stored = store.begin().and_then(|uow| {
            let written = uow.set_suggestion(kind, item.id, &answer)?;
            uow.commit()?;
            Ok(written)
        });
        match stored {
            Ok(true) => {
                log::debug!("{} #{} ({}): suggested {:?}", kind, item.id, item.label, answer);
                summary.suggested += 1;
            }
            Ok(false) => summary.superseded += 1,
            Err(e) => {
                log::warn!("{} #{}: could not store suggestion: {}", kind, item.id, e);
                summary.failed += 1;
            }
        }
    }

    log::info!(
        "suggest {}: {} considered, {} suggested, {} without template, {} failed",
        kind,
        summary.considered,
        summary.suggested,
        summary.no_template,
        summary.failed
    );
    summary
}
