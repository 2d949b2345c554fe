//! CLI entry point for the OQ test-suite generation orchestration engine.

use clap::{Parser, Subcommand};
use oq_agents::dispatch::AgentDispatcher;
use oq_agents::llm::{HttpCompletionClient, MockCompletionClient};
use oq_agents::regulatory::MockRegulatoryClient;
use oq_agents::vector::{HttpVectorSearchClient, MockVectorSearchClient};
use oq_agents::{CompletionClient, RegulatoryClient, VectorSearchClient};
use oq_common::config::WorkflowConfig;
use oq_common::errors::OceError;
use oq_common::io::{ingest_urs, IngestedUrs, DEFAULT_PROMPT_BUDGET};
use oq_common::logging::{init_logging, LogConfig};
use oq_common::types::{RegulatoryFinding, RetrievedSnippet};
use oqd::events::EventBus;
use oqd::workflow::WorkflowOutcome;
use oqd::{coordinator, run_workflow};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "oq", about = "GAMP-5 OQ test-suite generation orchestration engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Runs the full pipeline (or categorization only) for one URS document.
    Run {
        urs_path: PathBuf,
        #[arg(long)]
        category_only: bool,
        #[arg(long, default_value_t = coordinator::DEFAULT_MAX_PARALLELISM)]
        max_parallelism: usize,
        #[arg(long)]
        verbose: bool,
        #[arg(long, default_value = "output/test_suites")]
        output_dir: PathBuf,
    },
}

const EXIT_SUCCESS: u8 = 0;
const EXIT_GENERAL_ERROR: u8 = 1;
const EXIT_VALIDATION_FAILURE: u8 = 2;
const EXIT_GENERATION_FAILURE: u8 = 3;
const EXIT_COORDINATOR_TIMEOUT: u8 = 4;
const EXIT_AUDIT_FAILURE: u8 = 5;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let Command::Run {
        urs_path,
        category_only,
        max_parallelism,
        verbose,
        output_dir,
    } = cli.command;

    let log_config = if verbose {
        LogConfig {
            default_directive: "debug".to_string(),
            ..LogConfig::from_env()
        }
    } else {
        LogConfig::from_env()
    };
    init_logging(&log_config);

    let config = match WorkflowConfig::from_env() {
        Ok(config) => config,
        Err(err) => return report_failure(&err),
    };

    let correlation_id = uuid::Uuid::new_v4().to_string();
    info!(%correlation_id, path = %urs_path.display(), "starting run");

    let ingested = match ingest_urs(&urs_path, DEFAULT_PROMPT_BUDGET) {
        Ok(ingested) => ingested,
        Err(err) => return report_failure(&err),
    };

    let audit = oq_telemetry::AuditStore::new(&config.audit_dir);
    let events = EventBus::new(256);

    let outcome = dispatch_and_run(&config, &ingested, &correlation_id, category_only, max_parallelism, &output_dir, &audit, &events).await;

    match outcome {
        Ok(WorkflowOutcome::CategorizedOnly(categorization)) => {
            println!("{}", serde_json::to_string_pretty(&categorization).expect("categorization always serializes"));
            ExitCode::from(EXIT_SUCCESS)
        }
        Ok(WorkflowOutcome::Completed { suite, output_path }) => {
            info!(path = %output_path.display(), suite_id = %suite.suite_id, "run complete");
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(err) => report_failure(&err),
    }
}

/// Vector client implementation choice, resolved once at startup based on
/// whether `VECTOR_STORE_URL` is set. A real regulatory-API endpoint has
/// no recognized environment variable in this release (see DESIGN.md), so
/// the regulatory client is always the empty mock.
enum VectorClient {
    Http(HttpVectorSearchClient),
    Mock(MockVectorSearchClient),
}

impl VectorSearchClient for VectorClient {
    async fn search(&self, query_text: &str, collections: &[String], top_k: u32, timeout_seconds: u64, correlation_id: &str) -> Result<Vec<RetrievedSnippet>, OceError> {
        match self {
            VectorClient::Http(client) => client.search(query_text, collections, top_k, timeout_seconds, correlation_id).await,
            VectorClient::Mock(client) => client.search(query_text, collections, top_k, timeout_seconds, correlation_id).await,
        }
    }
}

enum CompletionClientImpl {
    Http(HttpCompletionClient),
    Mock(MockCompletionClient),
}

impl CompletionClient for CompletionClientImpl {
    async fn complete(&self, request: &oq_agents::llm::CompletionRequest, correlation_id: &str) -> Result<oq_agents::llm::CompletionResponse, OceError> {
        match self {
            CompletionClientImpl::Http(client) => client.complete(request, correlation_id).await,
            CompletionClientImpl::Mock(client) => client.complete(request, correlation_id).await,
        }
    }
}

/// No recognized regulatory-endpoint environment variable exists yet
/// (spec's env var list names only `LLM_MODEL`/`LLM_TIMEOUT_SECONDS`/
/// `VECTOR_STORE_URL`/`OTLP_ENDPOINT`/`AUDIT_DIR`); Research requests are
/// answered by the empty mock until one is added.
struct NoRegulatoryEndpoint(MockRegulatoryClient);

impl RegulatoryClient for NoRegulatoryEndpoint {
    async fn fetch(&self, source: &str, query: &str, timeout_seconds: u64, correlation_id: &str) -> Result<Vec<RegulatoryFinding>, OceError> {
        self.0.fetch(source, query, timeout_seconds, correlation_id).await
    }
}

#[allow(clippy::too_many_arguments)]
async fn dispatch_and_run(
    config: &WorkflowConfig,
    ingested: &IngestedUrs,
    correlation_id: &str,
    category_only: bool,
    max_parallelism: usize,
    output_dir: &Path,
    audit: &oq_telemetry::AuditStore,
    events: &EventBus,
) -> Result<WorkflowOutcome, OceError> {
    let completion = match config.llm_endpoint.as_deref() {
        Some(endpoint) => CompletionClientImpl::Http(HttpCompletionClient::new(endpoint)),
        None => CompletionClientImpl::Mock(MockCompletionClient::ok("{\"tests\":[]}")),
    };
    let vector = match config.vector_store_url.as_deref() {
        Some(url) => VectorClient::Http(HttpVectorSearchClient::new(url)),
        None => VectorClient::Mock(MockVectorSearchClient::empty()),
    };
    let regulatory = NoRegulatoryEndpoint(MockRegulatoryClient::empty());

    let dispatcher = Arc::new(AgentDispatcher::new(completion, vector, regulatory));

    run_workflow(
        ingested,
        correlation_id,
        category_only,
        max_parallelism,
        oqd::generator::DEFAULT_BATCH_SIZE,
        &config.llm_model,
        output_dir,
        dispatcher,
        audit,
        events,
    )
    .await
}

fn report_failure(err: &OceError) -> ExitCode {
    error!(code = %err.code(), "run failed: {err}");
    let report = serde_json::json!({
        "code": err.code().code_string(),
        "message": err.to_string(),
        "correlation_id": err.correlation_id(),
    });
    eprintln!("{}", serde_json::to_string_pretty(&report).expect("failure report always serializes"));

    let exit_code = match err {
        OceError::Validation { .. } => EXIT_VALIDATION_FAILURE,
        OceError::Generation { .. } => EXIT_GENERATION_FAILURE,
        OceError::Coordinator { .. } => EXIT_COORDINATOR_TIMEOUT,
        OceError::Audit { .. } => EXIT_AUDIT_FAILURE,
        _ => EXIT_GENERAL_ERROR,
    };
    ExitCode::from(exit_code)
}
