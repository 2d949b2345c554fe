//! Routes one `AgentRequest` to the client matching its payload kind and
//! assembles the typed `AgentResult` (spec §3/§4.3).

use crate::llm::{CompletionClient, CompletionRequest};
use crate::regulatory::RegulatoryClient;
use crate::vector::VectorSearchClient;
use chrono::Utc;
use oq_common::errors::{ErrorCode, OceError};
use oq_common::types::{
    AgentError, AgentErrorKind, AgentRequest, AgentRequestPayload, AgentResult, AgentResultData, RegulatoryFinding, RetrievedSnippet,
};
use std::collections::BTreeMap;

/// Bundles the three specialist clients behind one entry point so the
/// Coordinator fans out without matching on agent kind itself.
pub struct AgentDispatcher<C, V, R> {
    pub completion: C,
    pub vector: V,
    pub regulatory: R,
    /// Regulatory sources queried for a `Research` request's
    /// `regulatory_sources` list; `"fda"` is always present per spec §6.
    pub regulatory_source_names: Vec<String>,
}

impl<C, V, R> AgentDispatcher<C, V, R>
where
    C: CompletionClient,
    V: VectorSearchClient,
    R: RegulatoryClient,
{
    pub fn new(completion: C, vector: V, regulatory: R) -> Self {
        Self {
            completion,
            vector,
            regulatory,
            regulatory_source_names: vec!["fda".to_string()],
        }
    }

    /// Executes one request to completion (success or typed failure); the
    /// Coordinator applies its own timeout/retry envelope around this call.
    pub async fn dispatch(&self, request: &AgentRequest) -> AgentResult {
        let started_at = Utc::now();
        let result = match &request.payload {
            AgentRequestPayload::Context(payload) => {
                self.vector
                    .search(&payload.urs_excerpt, &payload.collections, payload.top_k, request.timeout_seconds, &request.correlation_id)
                    .await
                    .map(|snippets: Vec<RetrievedSnippet>| AgentResultData::Context { snippets })
            }
            AgentRequestPayload::Research(payload) => {
                self.fetch_all_sources(&payload.urs_excerpt, &payload.regulatory_sources, request.timeout_seconds, &request.correlation_id)
                    .await
                    .map(|findings| AgentResultData::Research { findings })
            }
            AgentRequestPayload::Sme(payload) => {
                self.assess(&payload.urs_excerpt, &payload.gamp_category, request.timeout_seconds, &request.correlation_id)
                    .await
            }
        };

        let finished_at = Utc::now();

        match result {
            Ok(data) => AgentResult::ok(request.request_id.clone(), request.agent_kind(), data, started_at, finished_at),
            Err(err) => {
                let agent_error = into_agent_error(err, &request.request_id, &request.correlation_id);
                AgentResult::err(request.request_id.clone(), request.agent_kind(), agent_error, started_at, finished_at)
            }
        }
    }

    async fn fetch_all_sources(
        &self,
        query: &str,
        sources: &[String],
        timeout_seconds: u64,
        correlation_id: &str,
    ) -> Result<Vec<RegulatoryFinding>, OceError> {
        let mut findings = Vec::new();
        let names: Vec<&String> = if sources.is_empty() {
            self.regulatory_source_names.iter().collect()
        } else {
            sources.iter().collect()
        };

        for source in names {
            let mut batch = self.regulatory.fetch(source, query, timeout_seconds, correlation_id).await?;
            findings.append(&mut batch);
        }

        Ok(findings)
    }

    async fn assess(&self, urs_excerpt: &str, gamp_category: &str, timeout_seconds: u64, correlation_id: &str) -> Result<AgentResultData, OceError> {
        let prompt = format!(
            "As a pharmaceutical validation SME, assess GAMP category {gamp_category} risk factors for:\n{urs_excerpt}"
        );
        let request = CompletionRequest {
            model: "sme-assessment".to_string(),
            prompt,
            schema: None,
            timeout_seconds,
            max_output_tokens: 1024,
        };
        let response = self.completion.complete(&request, correlation_id).await?;

        Ok(AgentResultData::Sme {
            assessment: response.text,
            citations: Vec::new(),
        })
    }
}

fn into_agent_error(err: OceError, request_id: &str, correlation_id: &str) -> AgentError {
    if let OceError::Agent { source, .. } = err {
        source
    } else {
        AgentError {
            kind: AgentErrorKind::Validation,
            message: err.to_string(),
            context: BTreeMap::from([("request_id".to_string(), request_id.to_string())]),
            correlation_id: correlation_id.to_string(),
        }
    }
}

/// Converts a request timeout into the `AgentErrorKind::Timeout` shape
/// expected when a Coordinator-level `tokio::time::timeout` elapses
/// before `dispatch` returns.
pub fn timeout_result(request: &AgentRequest, started_at: chrono::DateTime<Utc>) -> AgentResult {
    let finished_at = Utc::now();
    let error = AgentError {
        kind: AgentErrorKind::Timeout,
        message: format!("agent call exceeded {}s timeout", request.timeout_seconds),
        context: BTreeMap::new(),
        correlation_id: request.correlation_id.clone(),
    };
    let _ = ErrorCode::AgentTimeout;
    AgentResult::err(request.request_id.clone(), request.agent_kind(), error, started_at, finished_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockCompletionClient;
    use crate::regulatory::MockRegulatoryClient;
    use crate::vector::MockVectorSearchClient;
    use oq_common::types::{AgentRequestPayload, ContextPayload, RequestPriority, ResearchPayload, SmePayload};

    fn dispatcher() -> AgentDispatcher<MockCompletionClient, MockVectorSearchClient, MockRegulatoryClient> {
        AgentDispatcher::new(MockCompletionClient::ok("assessment text"), MockVectorSearchClient::empty(), MockRegulatoryClient::empty())
    }

    #[tokio::test]
    async fn context_request_routes_to_vector_search() {
        let dispatcher = dispatcher();
        let request = AgentRequest {
            request_id: "r1".to_string(),
            correlation_id: "corr-1".to_string(),
            payload: AgentRequestPayload::Context(ContextPayload {
                gamp_category: "4".to_string(),
                urs_excerpt: "system shall...".to_string(),
                collections: vec!["gamp5".to_string()],
                top_k: 5,
            }),
            timeout_seconds: 10,
        };
        let result = dispatcher.dispatch(&request).await;
        assert!(result.success);
        assert!(matches!(result.data, Some(AgentResultData::Context { .. })));
    }

    #[tokio::test]
    async fn research_request_routes_to_regulatory_fetch() {
        let dispatcher = dispatcher();
        let request = AgentRequest {
            request_id: "r2".to_string(),
            correlation_id: "corr-1".to_string(),
            payload: AgentRequestPayload::Research(ResearchPayload {
                gamp_category: "4".to_string(),
                urs_excerpt: "system shall...".to_string(),
                regulatory_sources: vec!["fda".to_string()],
            }),
            timeout_seconds: 10,
        };
        let result = dispatcher.dispatch(&request).await;
        assert!(result.success);
        assert!(matches!(result.data, Some(AgentResultData::Research { .. })));
    }

    #[tokio::test]
    async fn sme_request_routes_to_completion_client() {
        let dispatcher = dispatcher();
        let request = AgentRequest {
            request_id: "r3".to_string(),
            correlation_id: "corr-1".to_string(),
            payload: AgentRequestPayload::Sme(SmePayload {
                gamp_category: "5".to_string(),
                urs_excerpt: "system shall...".to_string(),
                priority: RequestPriority::High,
            }),
            timeout_seconds: 10,
        };
        let result = dispatcher.dispatch(&request).await;
        assert!(result.success);
        match result.data {
            Some(AgentResultData::Sme { assessment, .. }) => assert_eq!(assessment, "assessment text"),
            _ => panic!("expected Sme result"),
        }
    }

    #[tokio::test]
    async fn failing_completion_client_yields_typed_agent_error() {
        let dispatcher = AgentDispatcher::new(
            MockCompletionClient::failing("connection refused"),
            MockVectorSearchClient::empty(),
            MockRegulatoryClient::empty(),
        );
        let request = AgentRequest {
            request_id: "r4".to_string(),
            correlation_id: "corr-1".to_string(),
            payload: AgentRequestPayload::Sme(SmePayload {
                gamp_category: "5".to_string(),
                urs_excerpt: "x".to_string(),
                priority: RequestPriority::Normal,
            }),
            timeout_seconds: 10,
        };
        let result = dispatcher.dispatch(&request).await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap().kind, AgentErrorKind::Transport);
    }
}
