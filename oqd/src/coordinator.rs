//! Bounded-concurrency fan-out over a `PlanRequest`'s coordination requests
//! (spec §4.3, §5 Concurrency & Resource Model).
//!
//! Grounded on the teacher's bounded worker-pool dispatch (a semaphore
//! gating concurrent task spawns, `tokio::time::timeout` per task,
//! join-and-collect at the end) re-targeted at agent dispatch instead of
//! build-job execution.

use chrono::Utc;
use oq_agents::dispatch::{timeout_result, AgentDispatcher};
use oq_agents::{CompletionClient, RegulatoryClient, VectorSearchClient};
use oq_common::errors::{ErrorCode, OceError};
use oq_common::types::{AgentKind, AgentResultsBundle, PlanRequest};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

pub const DEFAULT_MAX_PARALLELISM: usize = 4;
const BUDGET_SLACK_SECONDS: u64 = 60;

/// Per-agent-kind success rate and mean latency computed from one
/// `AgentResultsBundle`. Observability only: the Coordinator never vetoes
/// or retries a dispatch based on this signal, it is only surfaced in the
/// `agent_dispatch_summary` audit record.
#[derive(Debug, Clone, Serialize)]
pub struct AgentKindReliability {
    pub agent_kind: AgentKind,
    pub success_rate: f64,
    pub mean_latency_seconds: f64,
}

/// Aggregates `bundle`'s results by agent kind. Empty bundles yield an
/// empty signal rather than a division by zero.
pub fn reliability_signal(bundle: &AgentResultsBundle) -> Vec<AgentKindReliability> {
    let mut by_kind: BTreeMap<AgentKind, (usize, usize, f64)> = BTreeMap::new();
    for result in &bundle.results {
        let entry = by_kind.entry(result.agent_kind).or_insert((0, 0, 0.0));
        entry.1 += 1;
        entry.2 += result.elapsed_seconds;
        if result.success {
            entry.0 += 1;
        }
    }

    by_kind
        .into_iter()
        .map(|(agent_kind, (success, total, sum_latency))| AgentKindReliability {
            agent_kind,
            success_rate: success as f64 / total as f64,
            mean_latency_seconds: sum_latency / total as f64,
        })
        .collect()
}

/// Runs every `PlanRequest::coordination_requests` entry, bounded to
/// `max_parallelism` concurrent in-flight calls. Individual agent failures
/// become `AgentResult { success: false, .. }` and never raise; only an
/// elapsed overall budget before any result is collected raises
/// `CoordinatorFailure` (spec §4.3).
pub async fn coordinate<C, V, R>(
    plan_request: &PlanRequest,
    dispatcher: Arc<AgentDispatcher<C, V, R>>,
    max_parallelism: usize,
) -> Result<AgentResultsBundle, OceError>
where
    C: CompletionClient + Send + Sync + 'static,
    V: VectorSearchClient + Send + Sync + 'static,
    R: RegulatoryClient + Send + Sync + 'static,
{
    if plan_request.coordination_requests.is_empty() {
        return Ok(AgentResultsBundle::new(Vec::new()));
    }

    let overall_budget = plan_request
        .coordination_requests
        .iter()
        .map(|r| r.timeout_seconds)
        .max()
        .unwrap_or(0)
        + BUDGET_SLACK_SECONDS;

    let semaphore = Arc::new(Semaphore::new(max_parallelism.max(1)));
    let mut tasks = Vec::with_capacity(plan_request.coordination_requests.len());

    for request in plan_request.coordination_requests.clone() {
        let dispatcher = Arc::clone(&dispatcher);
        let semaphore = Arc::clone(&semaphore);

        tasks.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore is never closed");
            let started_at = Utc::now();
            let per_task_timeout = Duration::from_secs(request.timeout_seconds);

            match tokio::time::timeout(per_task_timeout, dispatcher.dispatch(&request)).await {
                Ok(result) => result,
                Err(_) => timeout_result(&request, started_at),
            }
        }));
    }

    let joined = tokio::time::timeout(Duration::from_secs(overall_budget), futures_join_all(tasks)).await;

    let results = match joined {
        Ok(results) => results,
        Err(_) => {
            return Err(OceError::Coordinator {
                code: ErrorCode::CoordinatorOverallBudgetElapsed,
                message: ErrorCode::CoordinatorOverallBudgetElapsed.message().to_string(),
                context: BTreeMap::from([("overall_budget_seconds".to_string(), overall_budget.to_string())]),
                correlation_id: plan_request.correlation_id.clone(),
            });
        }
    };

    let agent_results = results.into_iter().filter_map(|joined| joined.ok()).collect::<Vec<_>>();

    if agent_results.is_empty() {
        return Err(OceError::Coordinator {
            code: ErrorCode::CoordinatorZeroResults,
            message: ErrorCode::CoordinatorZeroResults.message().to_string(),
            context: BTreeMap::new(),
            correlation_id: plan_request.correlation_id.clone(),
        });
    }

    Ok(AgentResultsBundle::new(agent_results))
}

/// `futures::future::join_all` equivalent without adding the `futures` crate
/// as a direct dependency: the Coordinator only ever joins `JoinHandle`s.
async fn futures_join_all<T>(tasks: Vec<tokio::task::JoinHandle<T>>) -> Vec<Result<T, tokio::task::JoinError>> {
    let mut results = Vec::with_capacity(tasks.len());
    for task in tasks {
        results.push(task.await);
    }
    results
}
