//! Batched, schema-constrained test generation (spec §4.4).
//!
//! Grounded on the teacher's chunked-job submission pattern (split large
//! work into provider-sized batches, one request per batch, concatenate)
//! adapted to LLM completions instead of compilation jobs. Structured
//! output is preferred via `schema`; `oq_common::json_extract` is the
//! balanced-bracket fallback when a response arrives as prose-wrapped JSON.

use oq_agents::llm::{CompletionClient, CompletionRequest};
use oq_common::errors::{ErrorCode, OceError};
use oq_common::json_extract::extract_and_parse;
use oq_common::types::{CategorizationResult, DraftMetadata, GampCategory, PlanRequest, TestCase, TestCategory, TestStep, TestSuiteDraft};
use schemars::{schema_for, JsonSchema};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

pub const DEFAULT_BATCH_SIZE: u32 = 10;
pub const MIN_BATCH_SIZE: u32 = 5;
pub const MAX_BATCH_SIZE: u32 = 15;

fn per_batch_timeout_seconds(category: GampCategory) -> u64 {
    match category {
        GampCategory::Cat1 => 120,
        GampCategory::Cat3 => 180,
        GampCategory::Cat4 => 300,
        GampCategory::Cat5 => 1200,
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct RawBatchResponse {
    tests: Vec<RawTestCase>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct RawTestCase {
    test_id: String,
    #[serde(alias = "name")]
    title: String,
    objective: String,
    #[serde(default)]
    prerequisites: Vec<String>,
    steps: Vec<RawTestStep>,
    acceptance_criteria: Vec<String>,
    regulatory_basis: Vec<String>,
    traceability: Vec<String>,
    category: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct RawTestStep {
    #[serde(alias = "description")]
    action: String,
    #[serde(alias = "expected_results")]
    expected_result: String,
    #[serde(default)]
    data: Option<String>,
}

fn parse_test_category(raw: &str) -> Option<TestCategory> {
    match raw {
        "installation" => Some(TestCategory::Installation),
        "functional" => Some(TestCategory::Functional),
        "performance" => Some(TestCategory::Performance),
        "security" => Some(TestCategory::Security),
        "data_integrity" | "data-integrity" => Some(TestCategory::DataIntegrity),
        "integration" => Some(TestCategory::Integration),
        _ => None,
    }
}

fn to_test_case(raw: RawTestCase) -> Option<TestCase> {
    let category = parse_test_category(&raw.category)?;
    let aliased_title = raw.title;
    let steps = raw
        .steps
        .into_iter()
        .map(|s| TestStep {
            action: s.action,
            expected_result: s.expected_result,
            data: s.data,
        })
        .collect();

    Some(TestCase {
        test_id: raw.test_id,
        title: aliased_title,
        objective: raw.objective,
        prerequisites: raw.prerequisites,
        steps,
        acceptance_criteria: raw.acceptance_criteria,
        regulatory_basis: raw.regulatory_basis,
        traceability: raw.traceability,
        category,
    })
}

fn batch_schema() -> serde_json::Value {
    serde_json::to_value(schema_for!(RawBatchResponse)).expect("RawBatchResponse schema always serializes")
}

fn build_prompt(urs_excerpt: &str, category: GampCategory, produced: u32, this_batch: u32, seen_ids: &BTreeSet<String>) -> String {
    let first_id = produced + 1;
    let last_id = produced + this_batch;
    let seen: Vec<&str> = seen_ids.iter().map(String::as_str).collect();
    format!(
        "Generate exactly {this_batch} GAMP-5 Category {category} OQ test cases, numbered OQ-{first_id:03} through OQ-{last_id:03}. \
         Already-emitted test IDs (do not repeat): {seen:?}\n\nURS excerpt:\n{urs_excerpt}"
    )
}

enum BatchAttemptError {
    Parse,
    Duplicate,
}

async fn attempt_batch<C: CompletionClient>(
    completion: &C,
    request: &CompletionRequest,
    seen_ids: &BTreeSet<String>,
    correlation_id: &str,
) -> Result<Vec<TestCase>, BatchAttemptError> {
    let response = completion.complete(request, correlation_id).await.map_err(|_| BatchAttemptError::Parse)?;

    let parsed: RawBatchResponse = serde_json::from_str(&response.text)
        .or_else(|_| extract_and_parse(&response.text))
        .map_err(|_| BatchAttemptError::Parse)?;

    let mut out = Vec::with_capacity(parsed.tests.len());
    let mut local_ids = BTreeSet::new();

    for raw in parsed.tests {
        let test_id = raw.test_id.clone();
        if seen_ids.contains(&test_id) || !local_ids.insert(test_id) {
            return Err(BatchAttemptError::Duplicate);
        }
        let test_case = to_test_case(raw).ok_or(BatchAttemptError::Parse)?;
        out.push(test_case);
    }

    Ok(out)
}

/// Produces a `TestSuiteDraft` by batching completion requests until the
/// planner's `target_max` is reached or exceeded. Never truncates or pads
/// the result to fit the range; range enforcement is the caller's job via
/// `GenerationFailure`.
pub async fn generate<C: CompletionClient>(
    completion: &C,
    urs_excerpt: &str,
    categorization: &CategorizationResult,
    plan_request: &PlanRequest,
    batch_size: u32,
    model: &str,
) -> Result<TestSuiteDraft, OceError> {
    let correlation_id = &categorization.correlation_id;
    let target_min = plan_request.target_test_count_range.0;
    let target_max = plan_request.target_test_count_range.1;
    let batch_size = batch_size.clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE);
    let batch_count = target_max.div_ceil(batch_size);
    let timeout_seconds = per_batch_timeout_seconds(categorization.category);

    let mut tests: Vec<TestCase> = Vec::new();
    let mut seen_ids: BTreeSet<String> = BTreeSet::new();
    let mut batches_attempted = 0u32;

    for _ in 0..batch_count {
        let produced = tests.len() as u32;
        let remaining = target_max.saturating_sub(produced);
        if remaining == 0 {
            break;
        }
        let this_batch = remaining.min(batch_size);

        let prompt = build_prompt(urs_excerpt, categorization.category, produced, this_batch, &seen_ids);
        let request = CompletionRequest {
            model: model.to_string(),
            prompt,
            schema: Some(batch_schema()),
            timeout_seconds,
            max_output_tokens: 4096,
        };

        batches_attempted += 1;
        let first_attempt = attempt_batch(completion, &request, &seen_ids, correlation_id).await;
        let batch_tests = match first_attempt {
            Ok(batch_tests) => batch_tests,
            Err(first_err) => {
                debug!(batch = batches_attempted, "generator batch failed, retrying once with identical prompt");
                batches_attempted += 1;
                match attempt_batch(completion, &request, &seen_ids, correlation_id).await {
                    Ok(batch_tests) => batch_tests,
                    Err(second_err) => {
                        let code = match (first_err, second_err) {
                            (_, BatchAttemptError::Duplicate) => ErrorCode::GenerationDuplicateTestId,
                            _ => ErrorCode::GenerationParseFailed,
                        };
                        return Err(OceError::Generation {
                            code,
                            message: code.message().to_string(),
                            context: BTreeMap::from([("batches_attempted".to_string(), batches_attempted.to_string())]),
                            correlation_id: correlation_id.clone(),
                        });
                    }
                }
            }
        };

        for test_case in batch_tests {
            seen_ids.insert(test_case.test_id.clone());
            tests.push(test_case);
        }
    }

    let produced = tests.len() as u32;
    if produced < target_min {
        return Err(OceError::Generation {
            code: ErrorCode::GenerationUndercount,
            message: format!("{} ({produced}<{target_min})", ErrorCode::GenerationUndercount.message()),
            context: BTreeMap::from([("produced".to_string(), produced.to_string()), ("target_min".to_string(), target_min.to_string())]),
            correlation_id: correlation_id.clone(),
        });
    }
    if produced > target_max {
        return Err(OceError::Generation {
            code: ErrorCode::GenerationOvercount,
            message: format!("{} ({produced}>{target_max})", ErrorCode::GenerationOvercount.message()),
            context: BTreeMap::from([("produced".to_string(), produced.to_string()), ("target_max".to_string(), target_max.to_string())]),
            correlation_id: correlation_id.clone(),
        });
    }

    Ok(TestSuiteDraft {
        tests,
        metadata: DraftMetadata {
            batches_attempted,
            category: categorization.category,
            correlation_id: correlation_id.clone(),
        },
    })
}
