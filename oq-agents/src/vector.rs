//! Embedding + vector search adapter (spec §6: `search(query_text,
//! collections, top_k) -> list<{doc_id, score, metadata}>`).

use crate::rate_limit::TokenBucket;
use oq_common::errors::{ErrorCode, OceError};
use oq_common::types::{AgentError, AgentErrorKind, RetrievedSnippet};
use std::collections::BTreeMap;
use std::time::Duration;

/// The four corpora the Categorizer/Context agent may query.
pub const COLLECTIONS: &[&str] = &["gamp5", "regulatory", "sops", "best_practices"];

pub trait VectorSearchClient: Send + Sync {
    fn search(
        &self,
        query_text: &str,
        collections: &[String],
        top_k: u32,
        timeout_seconds: u64,
        correlation_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<RetrievedSnippet>, OceError>> + Send;
}

pub struct HttpVectorSearchClient {
    http: reqwest::Client,
    endpoint: String,
    rate_limiter: TokenBucket,
}

impl HttpVectorSearchClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            rate_limiter: TokenBucket::new(20.0, 20.0),
        }
    }
}

#[derive(serde::Serialize)]
struct SearchRequest<'a> {
    query_text: &'a str,
    collections: &'a [String],
    top_k: u32,
}

impl VectorSearchClient for HttpVectorSearchClient {
    async fn search(
        &self,
        query_text: &str,
        collections: &[String],
        top_k: u32,
        timeout_seconds: u64,
        correlation_id: &str,
    ) -> Result<Vec<RetrievedSnippet>, OceError> {
        self.rate_limiter.acquire().await;

        let body = SearchRequest {
            query_text,
            collections,
            top_k,
        };
        let timeout = Duration::from_secs(timeout_seconds);

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(e.to_string(), correlation_id))?;

        if !response.status().is_success() {
            return Err(transport_error(format!("vector search endpoint returned {}", response.status()), correlation_id));
        }

        response
            .json::<Vec<RetrievedSnippet>>()
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

/// An empty result is a valid, non-error outcome (spec §6); the mock
/// honors that by default.
pub struct MockVectorSearchClient {
    pub snippets: Vec<RetrievedSnippet>,
}

impl MockVectorSearchClient {
    pub fn empty() -> Self {
        Self { snippets: Vec::new() }
    }

    pub fn with(snippets: Vec<RetrievedSnippet>) -> Self {
        Self { snippets }
    }
}

impl VectorSearchClient for MockVectorSearchClient {
    async fn search(
        &self,
        _query_text: &str,
        _collections: &[String],
        top_k: u32,
        _timeout_seconds: u64,
        _correlation_id: &str,
    ) -> Result<Vec<RetrievedSnippet>, OceError> {
        Ok(self.snippets.iter().take(top_k as usize).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_result_is_not_an_error() {
        let client = MockVectorSearchClient::empty();
        let result = client.search("query", &["gamp5".to_string()], 5, 5, "corr-1").await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn mock_honors_top_k() {
        let snippets = vec![
            RetrievedSnippet {
                doc_id: "a".to_string(),
                score: 0.9,
                collection: "gamp5".to_string(),
                text: "a".to_string(),
            },
            RetrievedSnippet {
                doc_id: "b".to_string(),
                score: 0.8,
                collection: "gamp5".to_string(),
                text: "b".to_string(),
            },
        ];
        let client = MockVectorSearchClient::with(snippets);
        let result = client.search("query", &["gamp5".to_string()], 1, 5, "corr-1").await.unwrap();
        assert_eq!(result.len(), 1);
    }
}
