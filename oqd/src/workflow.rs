//! Wires Categorizer → Planner → Coordinator → Generator → Validator into
//! a single workflow run, auditing every transition (spec §2, §4.6, §5).

use crate::events::EventBus;
use crate::{categorizer, coordinator, generator, planner, validator};
use oq_agents::dispatch::AgentDispatcher;
use oq_agents::{CompletionClient, RegulatoryClient, VectorSearchClient};
use oq_common::errors::{ErrorCode, OceError};
use oq_common::io::IngestedUrs;
use oq_common::types::{CategorizationResult, GampCategory, OqTestSuite};
use oq_telemetry::AuditStore;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Result of one workflow run: either a category-only stop (when the
/// caller passed `--category-only`) or a fully admitted, persisted suite.
pub enum WorkflowOutcome {
    CategorizedOnly(CategorizationResult),
    Completed { suite: OqTestSuite, output_path: PathBuf },
}

fn overall_wall_clock_cap(category: GampCategory) -> Duration {
    let seconds = match category {
        GampCategory::Cat1 => 300,
        GampCategory::Cat3 => 600,
        GampCategory::Cat4 => 900,
        GampCategory::Cat5 => 1800,
    };
    Duration::from_secs(seconds)
}

/// Runs the full pipeline for one URS document.
#[allow(clippy::too_many_arguments)]
pub async fn run_workflow<C, V, R>(
    ingested: &IngestedUrs,
    correlation_id: &str,
    category_only: bool,
    max_parallelism: usize,
    batch_size: u32,
    llm_model: &str,
    output_dir: &Path,
    dispatcher: Arc<AgentDispatcher<C, V, R>>,
    audit: &AuditStore,
    events: &EventBus,
) -> Result<WorkflowOutcome, OceError>
where
    C: CompletionClient + Send + Sync + 'static,
    V: VectorSearchClient + Send + Sync + 'static,
    R: RegulatoryClient + Send + Sync + 'static,
{
    let urs = oq_common::types::UrsDocument::new(ingested.document_id.clone(), ingested.document_id.clone(), ingested.full_content.clone());

    let categorization = categorizer::categorize(&urs, correlation_id)?;
    audit
        .append(
            "categorizer",
            "categorized",
            correlation_id,
            json!({
                "category": categorization.category.to_string(),
                "confidence": categorization.confidence,
                "review_required": categorization.review_required,
            }),
        )
        .await?;
    events.emit("categorized", &categorization);

    if category_only {
        return Ok(WorkflowOutcome::CategorizedOnly(categorization));
    }

    let overall_cap = overall_wall_clock_cap(categorization.category);
    let run_future = run_rest_of_pipeline(
        &ingested.prompt_excerpt,
        &ingested.full_content,
        &categorization,
        max_parallelism,
        batch_size,
        llm_model,
        output_dir,
        dispatcher,
        audit,
        events,
    );

    match tokio::time::timeout(overall_cap, run_future).await {
        Ok(result) => result,
        Err(_) => Err(OceError::Coordinator {
            code: ErrorCode::CoordinatorOverallBudgetElapsed,
            message: "workflow exceeded its overall wall-clock cap".to_string(),
            context: Default::default(),
            correlation_id: correlation_id.to_string(),
        }),
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_rest_of_pipeline<C, V, R>(
    urs_prompt_excerpt: &str,
    urs_full_content: &str,
    categorization: &CategorizationResult,
    max_parallelism: usize,
    batch_size: u32,
    llm_model: &str,
    output_dir: &Path,
    dispatcher: Arc<AgentDispatcher<C, V, R>>,
    audit: &AuditStore,
    events: &EventBus,
) -> Result<WorkflowOutcome, OceError>
where
    C: CompletionClient + Send + Sync + 'static,
    V: VectorSearchClient + Send + Sync + 'static,
    R: RegulatoryClient + Send + Sync + 'static,
{
    let correlation_id = categorization.correlation_id.clone();

    let plan_request = planner::plan(categorization, urs_prompt_excerpt)?;
    audit
        .append(
            "planner",
            "planned",
            &correlation_id,
            json!({
                "strategy": plan_request.strategy.to_string(),
                "target_test_count_range": plan_request.target_test_count_range,
                "coordination_request_count": plan_request.coordination_requests.len(),
            }),
        )
        .await?;
    events.emit("planned", &plan_request.strategy.to_string());

    let bundle = coordinator::coordinate(&plan_request, Arc::clone(&dispatcher), max_parallelism).await?;
    let reliability = coordinator::reliability_signal(&bundle);
    audit
        .append(
            "coordinator",
            "agent_dispatch_summary",
            &correlation_id,
            json!({
                "success_count": bundle.success_count,
                "total_count": bundle.total_count,
                "reliability": reliability,
            }),
        )
        .await?;
    events.emit("coordinated", &json!({"success_count": bundle.success_count, "total_count": bundle.total_count}));

    let draft = generator::generate(&dispatcher.completion, urs_prompt_excerpt, categorization, &plan_request, batch_size, llm_model).await?;
    audit
        .append(
            "generator",
            "generated",
            &correlation_id,
            json!({
                "produced": draft.tests.len(),
                "batches_attempted": draft.metadata.batches_attempted,
            }),
        )
        .await?;
    events.emit("generated", &draft.metadata);

    let generated_at_utc = chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
    let suite = validator::validate(&draft, &plan_request, urs_full_content, &generated_at_utc)?;
    audit
        .append(
            "validator",
            "validated",
            &correlation_id,
            json!({
                "suite_id": suite.suite_id,
                "test_count": suite.tests.len(),
            }),
        )
        .await?;
    events.emit("validated", &suite.suite_id);

    let output_path = oq_common::io::write_test_suite_atomic(output_dir, &suite, &generated_at_utc)?;
    audit
        .append(
            "auditor",
            "suite_persisted",
            &correlation_id,
            json!({ "output_path": output_path.to_string_lossy() }),
        )
        .await?;
    events.emit("suite_persisted", &output_path.to_string_lossy().to_string());

    Ok(WorkflowOutcome::Completed { suite, output_path })
}
