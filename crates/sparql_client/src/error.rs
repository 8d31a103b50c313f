#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Could not build the HTTP client
    Client(String),
    /// Network error or timeout, after retries
    Network { source: String, message: String },
    /// Non-retryable HTTP status, or a retryable one after the last attempt
    Http { source: String, status: u16, message: String },
    /// 429 on every attempt
    RateLimited { source: String, attempts: u32 },
    /// Body is not a SPARQL JSON result set
    Parse { source: String, message: String },
}

impl SourceError {
    pub fn source_name(&self) -> Option<&str> {
        match self {
            SourceError::Client(_) => None,
            SourceError::Network { source, .. }
            | SourceError::Http { source, .. }
            | SourceError::RateLimited { source, .. }
            | SourceError::Parse { source, .. } => Some(source),
        }
    }
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Client(msg) => write!(f, "HTTP client error: {}", msg),
            SourceError::Network { source, message } => write!(f, "{} network error: {}", source, message),
            SourceError::Http { source, status, message } => write!(f, "{} HTTP {}: {}", source, status, message),
            SourceError::RateLimited { source, attempts } => {
                write!(f, "{} rate limited after {} attempts", source, attempts)
            }
            SourceError::Parse { source, message } => write!(f, "{} returned an invalid result: {}", source, message),
        }
    }
}

impl std::error::Error for SourceError {}
