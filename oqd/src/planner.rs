//! Deterministic category→strategy planning (spec §4.2).
//!
//! Grounded on the teacher's `HealthConfig`-style default-tunable-constants
//! struct pattern: the category→strategy table is a plain match over a
//! closed enum rather than a runtime-loaded table, since the mapping is
//! small, fixed, and spec-mandated.

use oq_common::errors::{ErrorCode, OceError};
use oq_common::types::{
    AgentKind, AgentRequest, AgentRequestPayload, CategorizationResult, ContextPayload, GampCategory, PlanRequest,
    RequestPriority, ResearchPayload, SmePayload, Strategy,
};
use std::collections::{BTreeMap, BTreeSet};

const CONTEXT_TIMEOUT_SECONDS: u64 = 60;
const SME_TIMEOUT_SECONDS: u64 = 120;
const RESEARCH_TIMEOUT_SECONDS: u64 = 300;

struct StrategyEntry {
    strategy: Strategy,
    count_range: (u32, u32),
    required_test_types: &'static [&'static str],
    agent_kinds: &'static [AgentKind],
}

fn strategy_entry(category: GampCategory) -> StrategyEntry {
    match category {
        GampCategory::Cat1 => StrategyEntry {
            strategy: Strategy::Minimal,
            count_range: (3, 5),
            required_test_types: &["installation"],
            agent_kinds: &[AgentKind::Context],
        },
        GampCategory::Cat3 => StrategyEntry {
            strategy: Strategy::Standard,
            count_range: (5, 10),
            required_test_types: &["installation", "functional"],
            agent_kinds: &[AgentKind::Context, AgentKind::Sme],
        },
        GampCategory::Cat4 => StrategyEntry {
            strategy: Strategy::Rigorous,
            count_range: (15, 20),
            required_test_types: &["installation", "functional", "data_integrity"],
            agent_kinds: &[AgentKind::Context, AgentKind::Research, AgentKind::Sme],
        },
        GampCategory::Cat5 => StrategyEntry {
            strategy: Strategy::FullSdlc,
            count_range: (25, 30),
            required_test_types: &["installation", "functional", "data_integrity", "security", "integration"],
            agent_kinds: &[AgentKind::Context, AgentKind::Research, AgentKind::Sme],
        },
    }
}

fn agent_timeout(kind: AgentKind) -> u64 {
    match kind {
        AgentKind::Context => CONTEXT_TIMEOUT_SECONDS,
        AgentKind::Sme => SME_TIMEOUT_SECONDS,
        AgentKind::Research => RESEARCH_TIMEOUT_SECONDS,
    }
}

fn build_request(
    request_index: usize,
    kind: AgentKind,
    category: GampCategory,
    urs_excerpt: &str,
    correlation_id: &str,
    priority: RequestPriority,
) -> AgentRequest {
    let gamp_category = category.to_string();
    let payload = match kind {
        AgentKind::Context => AgentRequestPayload::Context(ContextPayload {
            gamp_category,
            urs_excerpt: urs_excerpt.to_string(),
            collections: vec!["gamp5".to_string(), "sops".to_string(), "best_practices".to_string()],
            top_k: 5,
        }),
        AgentKind::Research => AgentRequestPayload::Research(ResearchPayload {
            gamp_category,
            urs_excerpt: urs_excerpt.to_string(),
            regulatory_sources: vec!["fda".to_string()],
        }),
        AgentKind::Sme => AgentRequestPayload::Sme(SmePayload {
            gamp_category,
            urs_excerpt: urs_excerpt.to_string(),
            priority,
        }),
    };

    AgentRequest {
        request_id: format!("req-{request_index}-{kind}"),
        correlation_id: correlation_id.to_string(),
        payload,
        timeout_seconds: agent_timeout(kind),
    }
}

/// Produces a `PlanRequest` from a categorization result. Still plans (does
/// not refuse) when `review_required` is set; in that case the SME request
/// carries `RequestPriority::High` (spec §4.2).
pub fn plan(categorization: &CategorizationResult, urs_excerpt: &str) -> Result<PlanRequest, OceError> {
    let entry = strategy_entry(categorization.category);

    if entry.count_range.0 > entry.count_range.1 {
        return Err(OceError::Planning {
            code: ErrorCode::PlanningInvalidCountRange,
            message: ErrorCode::PlanningInvalidCountRange.message().to_string(),
            context: BTreeMap::from([("category".to_string(), categorization.category.to_string())]),
            correlation_id: categorization.correlation_id.clone(),
        });
    }

    let priority = if categorization.review_required {
        RequestPriority::High
    } else {
        RequestPriority::Normal
    };

    let coordination_requests: Vec<AgentRequest> = entry
        .agent_kinds
        .iter()
        .enumerate()
        .map(|(idx, kind)| build_request(idx, *kind, categorization.category, urs_excerpt, &categorization.correlation_id, priority))
        .collect();

    let total_timeout: u64 = coordination_requests.iter().map(|r| r.timeout_seconds).sum();
    debug_assert!(total_timeout <= 3600, "coordination requests should fit an overall budget");

    Ok(PlanRequest {
        correlation_id: categorization.correlation_id.clone(),
        category: categorization.category,
        strategy: entry.strategy,
        required_test_types: entry.required_test_types.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
        compliance_tags: BTreeSet::from(["GAMP-5".to_string(), "21 CFR Part 11".to_string(), "ALCOA+".to_string()]),
        target_test_count_range: entry.count_range,
        coordination_requests,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categorization(category: GampCategory, review_required: bool) -> CategorizationResult {
        CategorizationResult {
            category,
            confidence: 0.9,
            evidence: Vec::new(),
            review_required,
            is_ambiguous: false,
            dominance_gap: 5.0,
            degraded: false,
            correlation_id: "corr-1".to_string(),
        }
    }

    #[test]
    fn cat1_maps_to_minimal_strategy_and_context_only() {
        let plan_request = plan(&categorization(GampCategory::Cat1, false), "urs text").unwrap();
        assert_eq!(plan_request.strategy, Strategy::Minimal);
        assert_eq!(plan_request.target_test_count_range, (3, 5));
        assert_eq!(plan_request.coordination_requests.len(), 1);
        assert_eq!(plan_request.coordination_requests[0].agent_kind(), AgentKind::Context);
    }

    #[test]
    fn cat5_maps_to_full_sdlc_with_all_three_agent_kinds() {
        let plan_request = plan(&categorization(GampCategory::Cat5, false), "urs text").unwrap();
        assert_eq!(plan_request.strategy, Strategy::FullSdlc);
        assert_eq!(plan_request.target_test_count_range, (25, 30));
        let kinds: BTreeSet<AgentKind> = plan_request.coordination_requests.iter().map(|r| r.agent_kind()).collect();
        assert_eq!(kinds, BTreeSet::from([AgentKind::Context, AgentKind::Research, AgentKind::Sme]));
    }

    #[test]
    fn review_required_escalates_sme_request_priority() {
        let plan_request = plan(&categorization(GampCategory::Cat4, true), "urs text").unwrap();
        let sme_request = plan_request.coordination_requests.iter().find(|r| r.agent_kind() == AgentKind::Sme).unwrap();
        match &sme_request.payload {
            AgentRequestPayload::Sme(sme) => assert_eq!(sme.priority, RequestPriority::High),
            other => panic!("expected SME payload, got {other:?}"),
        }
    }

    #[test]
    fn timeouts_sum_within_an_hour_budget() {
        for category in GampCategory::ALL {
            let plan_request = plan(&categorization(category, false), "urs text").unwrap();
            let total: u64 = plan_request.coordination_requests.iter().map(|r| r.timeout_seconds).sum();
            assert!(total <= 3600);
        }
    }

    #[test]
    fn correlation_id_propagates_from_categorization_to_every_request() {
        let plan_request = plan(&categorization(GampCategory::Cat4, false), "urs text").unwrap();
        for request in &plan_request.coordination_requests {
            assert_eq!(request.correlation_id, "corr-1");
        }
    }
}
