use std::thread;
use std::time::Duration;

use geoquiz_core::RawBinding;
use serde_json::Value;

use crate::error::SourceError;
use crate::SourceClient;

// ── Constants ───────────────────────────────────────────────────────

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
const USER_AGENT: &str = concat!("geoquiz/", env!("CARGO_PKG_VERSION"));
const ACCEPT: &str = "application/sparql-results+json, application/json;q=0.9";

// ── Retry policy ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// First backoff; doubled after every retry.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

// ── SparqlSource ────────────────────────────────────────────────────

/// One SPARQL endpoint plus the query sent to it.
///
/// `GET {endpoint}?query=...&format=json`, expecting a standard result set:
/// `{"results": {"bindings": [{"<var>": {"value": "..."}}, ...]}}`.
pub struct SparqlSource {
    name: String,
    endpoint: String,
    query: String,
    http: reqwest::blocking::Client,
    policy: RetryPolicy,
}

impl SparqlSource {
    pub fn new(name: &str, endpoint: &str, query: &str, timeout: Duration) -> Result<Self, SourceError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SourceError::Client(e.to_string()))?;

        Ok(Self {
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            query: query.to_string(),
            http,
            policy: RetryPolicy::default(),
        })
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn request(&self) -> reqwest::blocking::RequestBuilder {
        self.http
            .get(&self.endpoint)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .query(&[("query", self.query.as_str()), ("format", "json")])
    }

    /// GET with retry + exponential backoff.
    ///
    /// 429 honours `Retry-After` (seconds). 5xx and network errors are
    /// retried; any other 4xx fails at once.
    fn get_with_retry(&self) -> Result<Value, SourceError> {
        let mut backoff = self.policy.initial_backoff;
        let max = self.policy.max_retries;
        let mut attempt = 0u32;

        loop {
            match self.request().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();

                    if (400..500).contains(&status) && status != 429 {
                        let body = resp.text().unwrap_or_default();
                        return Err(SourceError::Http {
                            source: self.name.clone(),
                            status,
                            message: snippet(&body),
                        });
                    }

                    if status == 429 || status >= 500 {
                        if attempt == max {
                            return Err(if status == 429 {
                                SourceError::RateLimited {
                                    source: self.name.clone(),
                                    attempts: max + 1,
                                }
                            } else {
                                SourceError::Http {
                                    source: self.name.clone(),
                                    status,
                                    message: format!("upstream error after {} attempts", max + 1),
                                }
                            });
                        }

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
                            "{}: retry {}/{} in {:?} (HTTP {})",
                            self.name,
                            attempt + 1,
                            max,
                            wait,
                            status
                        );
                        thread::sleep(wait);
                        backoff *= 2;
                        attempt += 1;
                        continue;
                    }

                    let text = resp.text().map_err(|e| SourceError::Network {
                        source: self.name.clone(),
                        message: format!("failed to read response body: {e}"),
                    })?;
                    let trimmed = text.trim_start_matches('\u{feff}');
                    return serde_json::from_str(trimmed).map_err(|e| SourceError::Parse {
                        source: self.name.clone(),
                        message: format!("{} (body: {})", e, snippet(trimmed)),
                    });
                }
                Err(e) => {
                    if attempt == max {
                        return Err(SourceError::Network {
                            source: self.name.clone(),
                            message: format!("{} (after {} attempts)", e, max + 1),
                        });
                    }
                    log::warn!("{}: retry {}/{} in {:?} ({})", self.name, attempt + 1, max, backoff, e);
                    thread::sleep(backoff);
                    backoff *= 2;
                    attempt += 1;
                }
            }
        }
    }
}

impl SourceClient for SparqlSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> Result<Vec<RawBinding>, SourceError> {
        let body = self.get_with_retry()?;
        let rows = parse_bindings(&self.name, &body)?;
        log::info!("{}: fetched {} row(s)", self.name, rows.len());
        Ok(rows)
    }
}

/// Extract `results.bindings`. Rows that are not objects are skipped.
pub fn parse_bindings(source: &str, body: &Value) -> Result<Vec<RawBinding>, SourceError> {
    let bindings = body
        .pointer("/results/bindings")
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::Parse {
            source: source.to_string(),
            message: "missing results.bindings".to_string(),
        })?;

    let rows: Vec<RawBinding> = bindings.iter().filter_map(RawBinding::from_sparql_row).collect();
    if rows.len() < bindings.len() {
        log::warn!("{}: skipped {} malformed row(s)", source, bindings.len() - rows.len());
    }
    Ok(rows)
}

fn snippet(body: &str) -> String {
    body.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bindings_are_extracted() {
        let body = json!({
            "head": {"vars": ["country_label", "capital_label"]},
            "results": {"bindings": [
                {"country_label": {"type": "literal", "value": "Peru"},
                 "capital_label": {"type": "literal", "value": "Lima"}},
                "garbage",
                {"country_label": {"type": "literal", "value": "Chad"}}
            ]}
        });
        let rows = parse_bindings("wikidata", &body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("capital_label"), Some("Lima"));
        assert_eq!(rows[1].label(), Some("Chad"));
    }

    #[test]
    fn missing_bindings_is_parse_error() {
        let err = parse_bindings("dbpedia", &json!({"boolean": true})).unwrap_err();
        assert!(matches!(err, SourceError::Parse { .. }));
        assert_eq!(err.source_name(), Some("dbpedia"));
    }
}
