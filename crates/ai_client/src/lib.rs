//! `geoquiz-ai-client`: Completion service used to suggest missing or
//! disputed fact values.

pub mod client;

pub use client::{AiError, OpenAIClient};

/// Answers one free-text prompt.
pub trait CompletionService {
    /// Trimmed response text.
    fn complete(&self, prompt: &str) -> Result<String, AiError>;
}
