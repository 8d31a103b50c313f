// Completion client for fact suggestions
//
// Sends one user message per prompt to an OpenAI-compatible
// `/chat/completions` endpoint with deterministic decoding.

use std::thread;
use std::time::Duration;

use geoquiz_config::ai::{AIConfigStatus, ResolvedAIConfig};
use serde::{Deserialize, Serialize};

use crate::CompletionService;

const USER_AGENT: &str = concat!("geoquiz/", env!("CARGO_PKG_VERSION"));

/// Error from the completion service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AiError {
    /// Provider is `none`
    Disabled,
    /// Provider configured but no API key found
    MissingKey(String),
    /// Could not build the HTTP client
    Client(String),
    /// Network error or timeout, after retries
    NetworkError(String),
    /// API error response
    ApiError { status: u16, message: String },
    /// Failed to parse response
    ParseError(String),
    /// Response had no usable text
    InvalidResponse(String),
}

impl std::fmt::Display for AiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiError::Disabled => write!(f, "AI suggestions are disabled"),
            AiError::MissingKey(msg) => write!(f, "API key not configured: {}", msg),
            AiError::Client(msg) => write!(f, "HTTP client error: {}", msg),
            AiError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            AiError::ApiError { status, message } => write!(f, "API error ({}): {}", status, message),
            AiError::ParseError(msg) => write!(f, "Failed to parse response: {}", msg),
            AiError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
        }
    }
}

impl std::error::Error for AiError {}

// ============================================================================
// OpenAI API types
// ============================================================================

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct OpenAIMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIError {
    error: OpenAIErrorDetail,
}

#[derive(Deserialize)]
struct OpenAIErrorDetail {
    message: String,
}

// ============================================================================
// Client
// ============================================================================

pub struct OpenAIClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_retries: u32,
    initial_backoff: Duration,
}

impl OpenAIClient {
    pub fn new(endpoint: &str, api_key: &str, model: &str, timeout: Duration) -> Result<Self, AiError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AiError::Client(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
        })
    }

    /// Build from the resolved configuration; refuses unless it is ready.
    pub fn from_resolved(config: &ResolvedAIConfig) -> Result<Self, AiError> {
        match config.status {
            AIConfigStatus::Disabled => return Err(AiError::Disabled),
            AIConfigStatus::MissingKey => {
                return Err(AiError::MissingKey(
                    config.blocking_reason.clone().unwrap_or_default(),
                ))
            }
            AIConfigStatus::Ready => {}
        }
        let key = config
            .api_key
            .as_deref()
            .ok_or_else(|| AiError::MissingKey(config.provider_name().to_string()))?;

        let client = Self::new(
            &config.endpoint,
            key,
            &config.model,
            Duration::from_secs(config.timeout_secs),
        )?;
        Ok(client.with_retries(config.max_retries, Duration::from_secs(1)))
    }

    pub fn with_retries(mut self, max_retries: u32, initial_backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn send(&self, prompt: &str) -> Result<reqwest::blocking::Response, reqwest::Error> {
        let request = OpenAIRequest {
            model: &self.model,
            messages: vec![OpenAIMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
        };

        self.http
            .post(format!("{}/chat/completions", self.endpoint))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
    }
}

impl CompletionService for OpenAIClient {
    fn complete(&self, prompt: &str) -> Result<String, AiError> {
        let mut backoff = self.initial_backoff;
        let mut attempt = 0u32;

        let response = loop {
            match self.send(prompt) {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let retryable = status == 429 || status >= 500;

                    if retryable && attempt < self.max_retries {
                        let wait = if status == 429 {
                            resp.headers()
                                .get(reqwest::header::RETRY_AFTER)
                                .and_then(|v| v.to_str().ok())
                                .and_then(|v| v.trim().parse::<u64>().ok())
                                .map(Duration::from_secs)
                                .unwrap_or(backoff)
                        } else {
                            backoff
                        };
                        log::warn!(
                            "completion: retry {}/{} in {:?} (HTTP {})",
                            attempt + 1,
                            self.max_retries,
                            wait,
                            status
                        );
                        thread::sleep(wait);
                        backoff *= 2;
                        attempt += 1;
                        continue;
                    }
                    break resp;
                }
                Err(e) => {
                    if attempt == self.max_retries {
                        return Err(AiError::NetworkError(e.to_string()));
                    }
                    log::warn!(
                        "completion: retry {}/{} in {:?} ({})",
                        attempt + 1,
                        self.max_retries,
                        backoff,
                        e
                    );
                    thread::sleep(backoff);
                    backoff *= 2;
                    attempt += 1;
                }
            }
        };

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().unwrap_or_default();
            let message = serde_json::from_str::<OpenAIError>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);
            return Err(AiError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: OpenAIResponse = response
            .json()
            .map_err(|e| AiError::ParseError(e.to_string()))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AiError::InvalidResponse("No choices in response".to_string()))?;

        let text = content.trim();
        if text.is_empty() {
            return Err(AiError::InvalidResponse("empty completion".to_string()));
        }
        Ok(text.to_string())
    }
}
