use geoquiz_sparql_client::SourceError;
use geoquiz_store::{ReviewKind, StoreError};

#[derive(Debug)]
pub enum PipelineError {
    /// An upstream source failed; nothing was mutated
    Source(SourceError),
    /// The merged snapshot had no countries; nothing was mutated
    EmptySnapshot,
    Store(StoreError),
    ReviewNotFound { kind: ReviewKind, id: i64 },
    /// The review is not in a state that allows the transition
    InvalidTransition { kind: ReviewKind, id: i64, reason: String },
    /// Caller-supplied input rejected
    Invalid(String),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Source(e) => write!(f, "upstream fetch failed: {}", e),
            PipelineError::EmptySnapshot => {
                write!(f, "upstream returned no countries; refusing to reconcile against an empty snapshot")
            }
            PipelineError::Store(e) => write!(f, "{}", e),
            PipelineError::ReviewNotFound { kind, id } => write!(f, "{} review #{} not found", kind, id),
            PipelineError::InvalidTransition { kind, id, reason } => {
                write!(f, "{} review #{}: {}", kind, id, reason)
            }
            PipelineError::Invalid(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<SourceError> for PipelineError {
    fn from(e: SourceError) -> Self {
        PipelineError::Source(e)
    }
}

impl From<StoreError> for PipelineError {
    fn from(e: StoreError) -> Self {
        PipelineError::Store(e)
    }
}
