//! CLI Exit Code Registry
//!
//! Single source of truth for `geoquiz` exit codes. Cron wrappers and
//! scripts branch on these, so existing values never change meaning.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain    | Description                                  |
//! |---------|-----------|----------------------------------------------|
//! | 0       | Universal | Success                                      |
//! | 1       | Universal | General error (unspecified)                  |
//! | 2       | Universal | Usage error (bad args, bad config)           |
//! | 20-29   | store     | Run lock and database                        |
//! | 30-39   | upstream  | Knowledge-graph sources                      |
//! | 40-49   | ai        | Completion provider configuration            |
//! | 50-59   | review    | Review queue transitions                     |

use geoquiz_ai_client::AiError;
use geoquiz_pipeline::PipelineError;
use geoquiz_store::StoreError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unreadable or invalid settings.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Store (20-29)
// =============================================================================

/// Another seed/resync/apply/cycle run holds the run lock.
pub const EXIT_LOCK_HELD: u8 = 20;

/// Database could not be opened, read or written.
pub const EXIT_STORE: u8 = 21;

// =============================================================================
// Upstream (30-39)
// =============================================================================

/// A source failed after retries. Nothing was changed.
pub const EXIT_UPSTREAM: u8 = 30;

/// The sources returned no countries. Nothing was changed.
pub const EXIT_EMPTY_SNAPSHOT: u8 = 31;

// =============================================================================
// AI (40-49)
// =============================================================================

/// AI disabled (provider = none).
pub const EXIT_AI_DISABLED: u8 = 40;

/// AI provider configured but API key missing.
pub const EXIT_AI_MISSING_KEY: u8 = 41;

// =============================================================================
// Review (50-59)
// =============================================================================

/// No review with that kind and id.
pub const EXIT_REVIEW_NOT_FOUND: u8 = 50;

/// Review not in a state that allows the requested transition.
pub const EXIT_INVALID_TRANSITION: u8 = 51;

pub fn store_exit_code(err: &StoreError) -> u8 {
    match err {
        StoreError::LockHeld { .. } => EXIT_LOCK_HELD,
        _ => EXIT_STORE,
    }
}

pub fn ai_exit_code(err: &AiError) -> u8 {
    match err {
        AiError::Disabled => EXIT_AI_DISABLED,
        AiError::MissingKey(_) => EXIT_AI_MISSING_KEY,
        _ => EXIT_ERROR,
    }
}

pub fn pipeline_exit_code(err: &PipelineError) -> u8 {
    match err {
        PipelineError::Source(_) => EXIT_UPSTREAM,
        PipelineError::EmptySnapshot => EXIT_EMPTY_SNAPSHOT,
        PipelineError::Store(e) => store_exit_code(e),
        PipelineError::ReviewNotFound { .. } => EXIT_REVIEW_NOT_FOUND,
        PipelineError::InvalidTransition { .. } => EXIT_INVALID_TRANSITION,
        PipelineError::Invalid(_) => EXIT_USAGE,
    }
}
