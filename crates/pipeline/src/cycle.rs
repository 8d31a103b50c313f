use chrono::{DateTime, Utc};
use geoquiz_ai_client::CompletionService;
use geoquiz_sparql_client::SourceClient;
use geoquiz_store::Store;
use serde::Serialize;

use crate::error::PipelineError;
use crate::reconcile::{Reconciler, ResyncSummary};
use crate::suggest::{suggest_disputes, suggest_gaps, SuggestSummary};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    /// `None` when no completion service is configured.
    pub disputes: Option<SuggestSummary>,
    pub gaps: Option<SuggestSummary>,
    pub resync: ResyncSummary,
}

/// The batch entry point: suggest for disputes, suggest for gaps, then a
/// resync, whose first mutation is applying approved reviews.
pub fn cycle(
    store: &Store,
    sources: &[Box<dyn SourceClient>],
    service: Option<&dyn CompletionService>,
    now: DateTime<Utc>,
) -> Result<CycleSummary, PipelineError> {
    let (disputes, gaps) = match service {
        Some(service) => (
            Some(suggest_disputes(store, service)?),
            Some(suggest_gaps(store, service)?),
        ),
        None => {
            log::info!("no completion service configured, skipping suggestions");
            (None, None)
        }
    };

    let resync = Reconciler::new(store, sources).resync(now)?;
    Ok(CycleSummary { disputes, gaps, resync })
}
