//! LLM completion adapter (spec §6: "A completion endpoint taking
//! `(model, prompt, schema, timeout_seconds, max_output_tokens)`").

use crate::rate_limit::TokenBucket;
use oq_common::errors::{ErrorCode, OceError};
use oq_common::types::{AgentError, AgentErrorKind};
use std::collections::BTreeMap;
use std::time::Duration;

/// One outbound completion request.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    /// JSON Schema constraining the response, when the endpoint supports
    /// structured output. When absent, callers fall back to
    /// `oq_common::json_extract`.
    pub schema: Option<serde_json::Value>,
    pub timeout_seconds: u64,
    pub max_output_tokens: u32,
}

/// Raw completion text. The adapter never parses or interprets content;
/// that's the caller's (Generator's) job.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CompletionResponse {
    pub text: String,
}

/// Abstraction over a remote LLM completion endpoint. The OCE never talks
/// to a concrete provider SDK directly (spec §1 Non-goals: "does not
/// implement the LLM"); it depends only on this trait.
pub trait CompletionClient: Send + Sync {
    fn complete(
        &self,
        request: &CompletionRequest,
        correlation_id: &str,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, OceError>> + Send;
}

/// HTTP-backed completion client. Treats the provider as an opaque
/// remote collaborator per spec §1; the wire shape below is the adapter's
/// own minimal contract, not a specific vendor's API.
pub struct HttpCompletionClient {
    http: reqwest::Client,
    endpoint: String,
    rate_limiter: TokenBucket,
}

impl HttpCompletionClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            // LLM endpoints are not named in spec §5's "≥1 req/s FDA
            // default"; a conservative unthrottled-by-default bucket
            // still bounds local concurrency bursts.
            rate_limiter: TokenBucket::new(20.0, 20.0),
        }
    }
}

impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, request: &CompletionRequest, correlation_id: &str) -> Result<CompletionResponse, OceError> {
        self.rate_limiter.acquire().await;

        let timeout = Duration::from_secs(request.timeout_seconds);
        let send = self.http.post(&self.endpoint).json(request).timeout(timeout).send();

        let response = send.await.map_err(|e| transport_error(e.to_string(), correlation_id))?;

        if !response.status().is_success() {
            return Err(transport_error(format!("completion endpoint returned {}", response.status()), correlation_id));
        }

        response
            .json::<CompletionResponse>()
            .await
            .map_err(|e| parse_error(e.to_string(), correlation_id))
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

/// Deterministic stand-in for tests and local development: never makes a
/// network call, never invents content beyond what's configured.
pub struct MockCompletionClient {
    pub response: Result<CompletionResponse, String>,
}

impl MockCompletionClient {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            response: Ok(CompletionResponse { text: text.into() }),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            response: Err(message.into()),
        }
    }
}

impl CompletionClient for MockCompletionClient {
    async fn complete(&self, _request: &CompletionRequest, correlation_id: &str) -> Result<CompletionResponse, OceError> {
        match &self.response {
            Ok(resp) => Ok(resp.clone()),
            Err(message) => Err(transport_error(message.clone(), correlation_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_completion_client_returns_configured_text() {
        let client = MockCompletionClient::ok("{\"ok\":true}");
        let request = CompletionRequest {
            model: "test-model".to_string(),
            prompt: "prompt".to_string(),
            schema: None,
            timeout_seconds: 5,
            max_output_tokens: 100,
        };
        let response = client.complete(&request, "corr-1").await.unwrap();
        assert_eq!(response.text, "{\"ok\":true}");
    }

    #[tokio::test]
    async fn mock_completion_client_surfaces_configured_failure() {
        let client = MockCompletionClient::failing("simulated timeout");
        let request = CompletionRequest {
            model: "test-model".to_string(),
            prompt: "prompt".to_string(),
            schema: None,
            timeout_seconds: 5,
            max_output_tokens: 100,
        };
        let err = client.complete(&request, "corr-1").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AgentTransportError);
    }
}
