//! Regulatory data source adapter (spec §6: "HTTP GET with source-specific
//! endpoints; rate-limited. Non-2xx responses are errors (no retry on 4xx;
//! bounded retry on 5xx/429 with Retry-After honored)").

use crate::rate_limit::TokenBucket;
use crate::retry::RetryPolicy;
use oq_common::errors::{ErrorCode, OceError};
use oq_common::types::{AgentError, AgentErrorKind, RegulatoryFinding};
use std::collections::BTreeMap;
use std::time::Duration;

pub trait RegulatoryClient: Send + Sync {
    fn fetch(
        &self,
        source: &str,
        query: &str,
        timeout_seconds: u64,
        correlation_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<RegulatoryFinding>, OceError>> + Send;
}

/// One regulatory source's base URL. `rate` is applied per source, never
/// globally (spec §5).
pub struct RegulatorySource {
    pub name: String,
    pub base_url: String,
    pub rate_limiter: TokenBucket,
}

impl RegulatorySource {
    /// FDA guidance endpoints default to the spec's named floor of
    /// at least 1 request/second.
    pub fn fda(base_url: impl Into<String>) -> Self {
        Self {
            name: "fda".to_string(),
            base_url: base_url.into(),
            rate_limiter: TokenBucket::fda_default(),
        }
    }
}

pub struct HttpRegulatoryClient {
    http: reqwest::Client,
    sources: BTreeMap<String, RegulatorySource>,
    retry_policy: RetryPolicy,
}

impl HttpRegulatoryClient {
    pub fn new(sources: Vec<RegulatorySource>) -> Self {
        Self {
            http: reqwest::Client::new(),
            sources: sources.into_iter().map(|s| (s.name.clone(), s)).collect(),
            retry_policy: RetryPolicy::agent_default(),
        }
    }
}

impl RegulatoryClient for HttpRegulatoryClient {
    async fn fetch(&self, source: &str, query: &str, timeout_seconds: u64, correlation_id: &str) -> Result<Vec<RegulatoryFinding>, OceError> {
        let src = self.sources.get(source).ok_or_else(|| {
            transport_error(format!("unknown regulatory source '{source}'"), correlation_id)
        })?;

        let timeout = Duration::from_secs(timeout_seconds);
        let mut last_err = None;

        for attempt in 1..=self.retry_policy.max_attempts {
            src.rate_limiter.acquire().await;

            let result = self
                .http
                .get(&src.base_url)
                .query(&[("q", query)])
                .timeout(timeout)
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .json::<Vec<RegulatoryFinding>>()
                            .await
                            .map_err(|e| parse_error(e.to_string(), correlation_id));
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let retry_after = response
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .map(Duration::from_secs);

                        last_err = Some(transport_error(format!("{source} returned {status}"), correlation_id));

                        if attempt < self.retry_policy.max_attempts {
                            let delay = retry_after.unwrap_or_else(|| self.retry_policy.delay_for_attempt(attempt, rand::random::<f64>()));
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                    } else {
                        // 4xx: no retry.
                        return Err(transport_error(format!("{source} returned {status}"), correlation_id));
                    }
                }
                Err(e) => return Err(transport_error(e.to_string(), correlation_id)),
            }
        }

        Err(last_err.unwrap_or_else(|| transport_error(format!("{source} exhausted retries"), correlation_id)))
    }
}

fn transport_error(message: String, correlation_id: &str) -> OceError {
    OceError::Agent {
        code: ErrorCode::AgentTransportError,
        source: AgentError {
            kind: AgentErrorKind::Transport,
            message,
            context: BTreeMap::new(),
            correlation_id: correlation_id.to_string(),
        },
        correlation_id: correlation_id.to_string(),
    }
}

fn parse_error(message: String, correlation_id: &str) -> OceError {
    OceError::Agent {
        code: ErrorCode::AgentParseError,
        source: AgentError {
            kind: AgentErrorKind::Parse,
            message,
            context: BTreeMap::new(),
            correlation_id: correlation_id.to_string(),
        },
        correlation_id: correlation_id.to_string(),
    }
}

pub struct MockRegulatoryClient {
    pub findings: Vec<RegulatoryFinding>,
}

impl MockRegulatoryClient {
    pub fn empty() -> Self {
        Self { findings: Vec::new() }
    }

    pub fn with(findings: Vec<RegulatoryFinding>) -> Self {
        Self { findings }
    }
}

impl RegulatoryClient for MockRegulatoryClient {
    async fn fetch(&self, _source: &str, _query: &str, _timeout_seconds: u64, _correlation_id: &str) -> Result<Vec<RegulatoryFinding>, OceError> {
        Ok(self.findings.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_regulatory_client_returns_configured_findings() {
        let client = MockRegulatoryClient::with(vec![RegulatoryFinding {
            source: "fda".to_string(),
            title: "21 CFR Part 11".to_string(),
            summary: "electronic records".to_string(),
        }]);
        let result = client.fetch("fda", "electronic signatures", 5, "corr-1").await.unwrap();
        assert_eq!(result.len(), 1);
    }

    #[tokio::test]
    async fn http_client_errors_on_unknown_source() {
        let client = HttpRegulatoryClient::new(vec![]);
        let err = client.fetch("unknown", "q", 5, "corr-1").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AgentTransportError);
    }
}
