//! Admission rules for a `TestSuiteDraft` (spec §4.5).
//!
//! Grounded on the teacher's validation-report pattern (accumulate every
//! rule violation rather than short-circuiting on the first one, so a
//! single rejected run tells the caller everything wrong with it at once).

use oq_common::errors::{ErrorCode, OceError};
use oq_common::types::{ComplianceFlags, GampCategory, OqTestSuite, PlanRequest, SuiteMetadata, TestCategory, TestSuiteDraft};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::OnceLock;

const ALLOWED_REGULATORY_BASIS: &[&str] = &["GAMP-5", "21 CFR Part 11", "EU Annex 11", "ICH Q9", "ALCOA+"];

fn test_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^OQ-\d{3}$").expect("static test_id pattern is valid"))
}

/// Extracts bracketed or dashed requirement tokens (`REQ-001`, `[REQ-1]`,
/// `URS-12`) from the input URS so traceability can be checked against
/// tokens that actually appear in it.
fn requirement_tokens(urs_content: &str) -> BTreeSet<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"(?i)\b(?:REQ|URS|FR|NFR)-\d+\b").expect("static requirement token pattern is valid"));
    pattern.find_iter(urs_content).map(|m| m.as_str().to_uppercase()).collect()
}

/// Admits or rejects a draft. All rules are checked; a non-empty violation
/// list always fails, with no partial admission (spec §4.5).
pub fn validate(draft: &TestSuiteDraft, plan_request: &PlanRequest, urs_content: &str, generated_at_utc: &str) -> Result<OqTestSuite, OceError> {
    let mut violations: Vec<(ErrorCode, String)> = Vec::new();
    let (min, max) = plan_request.target_test_count_range;
    let count = draft.tests.len() as u32;

    if count < min || count > max {
        violations.push((ErrorCode::ValidationCountOutOfRange, format!("count: {count} not within [{min},{max}]")));
    }

    let mut ids: Vec<&str> = draft.tests.iter().map(|t| t.test_id.as_str()).collect();
    let mut seen = BTreeSet::new();
    for id in &ids {
        if !test_id_pattern().is_match(id) {
            violations.push((ErrorCode::ValidationIdFormatInvalid, format!("id_format: '{id}' does not match ^OQ-\\d{{3}}$")));
        }
        if !seen.insert(*id) {
            violations.push((ErrorCode::ValidationIdFormatInvalid, format!("id_unique: '{id}' is duplicated")));
        }
    }
    ids.sort_unstable();
    let contiguous = ids
        .iter()
        .enumerate()
        .all(|(i, id)| *id == format!("OQ-{:03}", i + 1));
    if !contiguous {
        violations.push((ErrorCode::ValidationIdNotContiguous, "id_contiguous: test_id sequence is not contiguous starting at OQ-001".to_string()));
    }

    let known_tokens = requirement_tokens(urs_content);
    for test in &draft.tests {
        if test.traceability.is_empty() {
            violations.push((ErrorCode::ValidationTraceabilityMissing, format!("traceability: {} has empty traceability", test.test_id)));
            continue;
        }
        let references_known_token = test.traceability.iter().any(|t| known_tokens.contains(&t.to_uppercase()));
        if !known_tokens.is_empty() && !references_known_token {
            violations.push((
                ErrorCode::ValidationTraceabilityMissing,
                format!("traceability: {} references no URS requirement token present in the input", test.test_id),
            ));
        }
    }

    let categories_present: HashSet<TestCategory> = draft.tests.iter().map(|t| t.category).collect();
    let required = required_category_coverage(plan_request.category);
    for category in required {
        if !categories_present.contains(&category) {
            violations.push((
                ErrorCode::ValidationCategoryCoverageMissing,
                format!("category_coverage: no {category} test present for category {}", plan_request.category),
            ));
        }
    }

    for test in &draft.tests {
        for basis in &test.regulatory_basis {
            if !ALLOWED_REGULATORY_BASIS.contains(&basis.as_str()) {
                violations.push((
                    ErrorCode::ValidationRegulatoryBasisInvalid,
                    format!("regulatory_basis: '{basis}' on {} is outside the allowed set", test.test_id),
                ));
            }
        }
    }

    let compliance_flags = compute_compliance_flags(draft);
    if !compliance_flags.all_true() {
        violations.push((ErrorCode::ValidationComplianceFlagFalse, "compliance_flags: one or more compliance flags computed as false".to_string()));
    }

    if !violations.is_empty() {
        let code = violations[0].0;
        let messages = violations.into_iter().map(|(_, message)| message).collect();
        return Err(OceError::validation(code, messages, plan_request.correlation_id.clone()));
    }

    let mut coverage_by_category: BTreeMap<String, u32> = BTreeMap::new();
    for test in &draft.tests {
        *coverage_by_category.entry(test.category.to_string()).or_insert(0) += 1;
    }

    Ok(OqTestSuite {
        suite_id: format!("suite-{}", plan_request.correlation_id),
        gamp_category: plan_request.category,
        tests: draft.tests.clone(),
        coverage_by_category,
        compliance_flags,
        metadata: SuiteMetadata {
            correlation_id: plan_request.correlation_id.clone(),
            strategy: plan_request.strategy,
            batches_attempted: draft.metadata.batches_attempted,
            generated_at_utc: generated_at_utc.to_string(),
        },
    })
}

fn required_category_coverage(category: GampCategory) -> Vec<TestCategory> {
    match category {
        GampCategory::Cat1 | GampCategory::Cat3 => Vec::new(),
        GampCategory::Cat4 => vec![TestCategory::Installation, TestCategory::DataIntegrity],
        GampCategory::Cat5 => vec![
            TestCategory::Installation,
            TestCategory::DataIntegrity,
            TestCategory::Security,
            TestCategory::Integration,
        ],
    }
}

/// Computes the three mandatory compliance flags from the draft's own
/// content: ALCOA+ requires every test to carry traceability (attributable,
/// contemporaneous evidence), GAMP-5 requires a non-empty regulatory basis
/// per test, and 21 CFR Part 11 requires every test to declare its basis
/// set includes "21 CFR Part 11" or "GAMP-5" (electronic-record controls).
fn compute_compliance_flags(draft: &TestSuiteDraft) -> ComplianceFlags {
    let alcoa_plus = !draft.tests.is_empty() && draft.tests.iter().all(|t| !t.traceability.is_empty());
    let gamp5 = !draft.tests.is_empty() && draft.tests.iter().all(|t| !t.regulatory_basis.is_empty());
    let cfr_part_11 = !draft.tests.is_empty()
        && draft
            .tests
            .iter()
            .all(|t| t.regulatory_basis.iter().any(|b| b == "21 CFR Part 11" || b == "GAMP-5"));

    ComplianceFlags {
        alcoa_plus,
        gamp5,
        cfr_part_11,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oq_common::types::{DraftMetadata, TestCase, TestStep};
    use std::collections::BTreeSet as Set;

    fn well_formed_test(n: u32, category: TestCategory) -> TestCase {
        TestCase {
            test_id: format!("OQ-{n:03}"),
            title: format!("Test {n}"),
            objective: "verify behavior".to_string(),
            prerequisites: Vec::new(),
            steps: vec![TestStep {
                action: "do thing".to_string(),
                expected_result: "thing happens".to_string(),
                data: None,
            }],
            acceptance_criteria: vec!["criteria met".to_string()],
            regulatory_basis: vec!["GAMP-5".to_string()],
            traceability: vec!["REQ-001".to_string()],
            category,
        }
    }

    fn plan_request(category: GampCategory, range: (u32, u32)) -> PlanRequest {
        PlanRequest {
            correlation_id: "corr-1".to_string(),
            category,
            strategy: oq_common::types::Strategy::Standard,
            required_test_types: Set::new(),
            compliance_tags: Set::new(),
            target_test_count_range: range,
            coordination_requests: Vec::new(),
        }
    }

    fn draft(tests: Vec<TestCase>, category: GampCategory) -> TestSuiteDraft {
        TestSuiteDraft {
            tests,
            metadata: DraftMetadata {
                batches_attempted: 1,
                category,
                correlation_id: "corr-1".to_string(),
            },
        }
    }

    #[test]
    fn well_formed_cat3_draft_is_admitted() {
        let tests = vec![
            well_formed_test(1, TestCategory::Functional),
            well_formed_test(2, TestCategory::Functional),
            well_formed_test(3, TestCategory::Installation),
        ];
        let result = validate(&draft(tests, GampCategory::Cat3), &plan_request(GampCategory::Cat3, (3, 10)), "REQ-001 describes the thing.", "20260101T000000Z");
        assert!(result.is_ok());
    }

    #[test]
    fn undercount_is_rejected() {
        let tests = vec![well_formed_test(1, TestCategory::Functional)];
        let result = validate(&draft(tests, GampCategory::Cat5), &plan_request(GampCategory::Cat5, (25, 30)), "REQ-001", "20260101T000000Z");
        assert!(result.is_err());
    }

    #[test]
    fn noncontiguous_ids_are_rejected() {
        let tests = vec![well_formed_test(1, TestCategory::Installation), well_formed_test(3, TestCategory::DataIntegrity)];
        let result = validate(&draft(tests, GampCategory::Cat4), &plan_request(GampCategory::Cat4, (1, 5)), "REQ-001", "20260101T000000Z");
        assert!(result.is_err());
    }

    #[test]
    fn cat4_requires_installation_and_data_integrity_coverage() {
        let tests = vec![well_formed_test(1, TestCategory::Functional), well_formed_test(2, TestCategory::Functional)];
        let result = validate(&draft(tests, GampCategory::Cat4), &plan_request(GampCategory::Cat4, (1, 5)), "REQ-001", "20260101T000000Z");
        let Err(OceError::Validation { violations, .. }) = result else {
            panic!("expected validation failure");
        };
        assert!(violations.iter().any(|v| v.contains("installation")));
        assert!(violations.iter().any(|v| v.contains("data_integrity")));
    }

    #[test]
    fn traceability_must_reference_a_token_present_in_the_urs() {
        let mut test = well_formed_test(1, TestCategory::Installation);
        test.traceability = vec!["REQ-999".to_string()];
        let result = validate(&draft(vec![test], GampCategory::Cat1), &plan_request(GampCategory::Cat1, (1, 1)), "Only REQ-001 appears here.", "20260101T000000Z");
        assert!(result.is_err());
    }

    #[test]
    fn disallowed_regulatory_basis_is_rejected() {
        let mut test = well_formed_test(1, TestCategory::Installation);
        test.regulatory_basis = vec!["Made Up Standard".to_string()];
        let result = validate(&draft(vec![test], GampCategory::Cat1), &plan_request(GampCategory::Cat1, (1, 1)), "REQ-001", "20260101T000000Z");
        assert!(result.is_err());
    }

    #[test]
    fn metadata_is_populated_from_plan_request_and_draft() {
        let tests = vec![
            well_formed_test(1, TestCategory::Functional),
            well_formed_test(2, TestCategory::Functional),
            well_formed_test(3, TestCategory::Installation),
        ];
        let result = validate(&draft(tests, GampCategory::Cat3), &plan_request(GampCategory::Cat3, (3, 10)), "REQ-001 describes the thing.", "20260215T120000Z").unwrap();
        assert_eq!(result.metadata.correlation_id, "corr-1");
        assert_eq!(result.metadata.strategy, oq_common::types::Strategy::Standard);
        assert_eq!(result.metadata.batches_attempted, 1);
        assert_eq!(result.metadata.generated_at_utc, "20260215T120000Z");
    }

    #[test]
    fn each_violation_category_reports_its_own_error_code() {
        let bad_id_test = {
            let mut t = well_formed_test(1, TestCategory::Installation);
            t.test_id = "BAD-1".to_string();
            t
        };
        let result = validate(&draft(vec![bad_id_test], GampCategory::Cat1), &plan_request(GampCategory::Cat1, (1, 1)), "REQ-001", "20260101T000000Z");
        let Err(OceError::Validation { code, .. }) = result else {
            panic!("expected validation failure");
        };
        assert_eq!(code, ErrorCode::ValidationIdFormatInvalid);

        let undercount = validate(&draft(vec![], GampCategory::Cat1), &plan_request(GampCategory::Cat1, (1, 1)), "REQ-001", "20260101T000000Z");
        let Err(OceError::Validation { code, .. }) = undercount else {
            panic!("expected validation failure");
        };
        assert_eq!(code, ErrorCode::ValidationCountOutOfRange);
    }
}
