//! Error Catalog for the OQ orchestration engine.
//!
//! Mirrors the teacher's error-catalog shape (unique codes, categorized by
//! subsystem, each with a message template and remediation steps) but
//! re-scoped to the OCE's own failure taxonomy (spec §7).
//!
//! # Error Code Ranges
//!
//! | Range      | Category       | Description                          |
//! |------------|----------------|---------------------------------------|
//! | E001-E099  | Config         | Configuration and environment errors   |
//! | E100-E199  | Categorization | GAMP categorization failures           |
//! | E200-E299  | Planning       | Planner failures                       |
//! | E300-E399  | Coordination   | Coordinator / agent dispatch failures  |
//! | E400-E499  | Generation     | Generator / structured-output failures |
//! | E500-E599  | Validation     | Validator rule violations              |
//! | E600-E699  | Audit          | Audit chain failures                   |

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error code enumeration covering all OCE error scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    // === Config (E001-E099) ===
    ConfigMissingLlmModel,
    ConfigInvalidTimeout,
    ConfigInvalidAuditDir,
    ConfigUnreadableUrs,
    ConfigNonUtf8Environment,

    // === Categorization (E100-E199) ===
    CategorizationEmptyInput,
    CategorizationNoPositiveScore,
    CategorizationInvalidCategory,

    // === Planning (E200-E299) ===
    PlanningNoStrategyForCategory,
    PlanningInvalidCountRange,

    // === Coordination (E300-E399) ===
    CoordinatorOverallBudgetElapsed,
    CoordinatorZeroResults,
    AgentTimeout,
    AgentTransportError,
    AgentParseError,
    AgentValidationError,

    // === Generation (E400-E499) ===
    GenerationBatchTimeout,
    GenerationParseFailed,
    GenerationDuplicateTestId,
    GenerationUndercount,
    GenerationOvercount,

    // === Validation (E500-E599) ===
    ValidationCountOutOfRange,
    ValidationIdFormatInvalid,
    ValidationIdNotContiguous,
    ValidationTraceabilityMissing,
    ValidationCategoryCoverageMissing,
    ValidationRegulatoryBasisInvalid,
    ValidationComplianceFlagFalse,

    // === Audit (E600-E699) ===
    AuditChainBroken,
    AuditStorageFailure,
    AuditSerializationFailure,
}

impl ErrorCode {
    #[must_use]
    pub const fn code_number(&self) -> u32 {
        match self {
            Self::ConfigMissingLlmModel => 1,
            Self::ConfigInvalidTimeout => 2,
            Self::ConfigInvalidAuditDir => 3,
            Self::ConfigUnreadableUrs => 4,
            Self::ConfigNonUtf8Environment => 5,

            Self::CategorizationEmptyInput => 100,
            Self::CategorizationNoPositiveScore => 101,
            Self::CategorizationInvalidCategory => 102,

            Self::PlanningNoStrategyForCategory => 200,
            Self::PlanningInvalidCountRange => 201,

            Self::CoordinatorOverallBudgetElapsed => 300,
            Self::CoordinatorZeroResults => 301,
            Self::AgentTimeout => 310,
            Self::AgentTransportError => 311,
            Self::AgentParseError => 312,
            Self::AgentValidationError => 313,

            Self::GenerationBatchTimeout => 400,
            Self::GenerationParseFailed => 401,
            Self::GenerationDuplicateTestId => 402,
            Self::GenerationUndercount => 403,
            Self::GenerationOvercount => 404,

            Self::ValidationCountOutOfRange => 500,
            Self::ValidationIdFormatInvalid => 501,
            Self::ValidationIdNotContiguous => 502,
            Self::ValidationTraceabilityMissing => 503,
            Self::ValidationCategoryCoverageMissing => 504,
            Self::ValidationRegulatoryBasisInvalid => 505,
            Self::ValidationComplianceFlagFalse => 506,

            Self::AuditChainBroken => 600,
            Self::AuditStorageFailure => 601,
            Self::AuditSerializationFailure => 602,
        }
    }

    #[must_use]
    pub fn code_string(&self) -> String {
        format!("OQ-E{:03}", self.code_number())
    }

    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self.code_number() {
            1..=99 => ErrorCategory::Config,
            100..=199 => ErrorCategory::Categorization,
            200..=299 => ErrorCategory::Planning,
            300..=399 => ErrorCategory::Coordination,
            400..=499 => ErrorCategory::Generation,
            500..=599 => ErrorCategory::Validation,
            _ => ErrorCategory::Audit,
        }
    }

    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::ConfigMissingLlmModel => "LLM_MODEL environment variable is required",
            Self::ConfigInvalidTimeout => "LLM_TIMEOUT_SECONDS could not be parsed as a positive integer",
            Self::ConfigInvalidAuditDir => "AUDIT_DIR is not writable",
            Self::ConfigUnreadableUrs => "URS input file could not be read as UTF-8 text",
            Self::ConfigNonUtf8Environment => "console/output encoding is not UTF-8",

            Self::CategorizationEmptyInput => "URS document content is empty",
            Self::CategorizationNoPositiveScore => "no GAMP category attained a positive net score",
            Self::CategorizationInvalidCategory => "computed category is not one of {1,3,4,5}",

            Self::PlanningNoStrategyForCategory => "category has no entry in the strategy table",
            Self::PlanningInvalidCountRange => "target test count range is empty or inverted",

            Self::CoordinatorOverallBudgetElapsed => "overall coordinator budget elapsed before any result was collected",
            Self::CoordinatorZeroResults => "coordinator produced an empty results bundle",
            Self::AgentTimeout => "agent call exceeded its per-request timeout",
            Self::AgentTransportError => "agent adapter transport error",
            Self::AgentParseError => "agent response could not be parsed",
            Self::AgentValidationError => "agent response failed schema validation",

            Self::GenerationBatchTimeout => "batch completion exceeded its category timeout",
            Self::GenerationParseFailed => "batch output could not be parsed as structured JSON",
            Self::GenerationDuplicateTestId => "batch returned a test_id already emitted by a prior batch",
            Self::GenerationUndercount => "generated test count is below the planner's minimum",
            Self::GenerationOvercount => "generated test count exceeds the planner's maximum",

            Self::ValidationCountOutOfRange => "test count is outside the planner's [min, max] range",
            Self::ValidationIdFormatInvalid => "test_id does not match ^OQ-\\d{3}$ or is not unique",
            Self::ValidationIdNotContiguous => "test_id sequence is not contiguous starting at OQ-001",
            Self::ValidationTraceabilityMissing => "a test has empty traceability or references no URS token",
            Self::ValidationCategoryCoverageMissing => "required test category coverage for this GAMP level is missing",
            Self::ValidationRegulatoryBasisInvalid => "regulatory_basis contains a value outside the allowed set",
            Self::ValidationComplianceFlagFalse => "one or more compliance flags computed as false",

            Self::AuditChainBroken => "audit record parent_hash does not match the previous record's record_hash",
            Self::AuditStorageFailure => "audit store failed to persist a record",
            Self::AuditSerializationFailure => "audit record could not be canonically serialized",
        }
    }

    #[must_use]
    pub fn remediation(&self) -> Vec<&'static str> {
        match self {
            Self::ConfigMissingLlmModel => vec!["Set LLM_MODEL before invoking `oq run`"],
            Self::ConfigInvalidTimeout => vec!["Set LLM_TIMEOUT_SECONDS to a positive integer, or unset it to use the category default"],
            Self::ConfigInvalidAuditDir => vec!["Point AUDIT_DIR at a directory the process can create and write to"],
            Self::ConfigUnreadableUrs => vec!["Re-save the URS file as UTF-8 text"],
            Self::ConfigNonUtf8Environment => vec!["Run in a UTF-8 locale (e.g. LANG=en_US.UTF-8)"],

            Self::CategorizationEmptyInput => vec!["Provide a non-empty URS document"],
            Self::CategorizationNoPositiveScore => vec!["Review the URS for GAMP-5 indicator language, or extend the indicator tables"],
            Self::CategorizationInvalidCategory => vec!["This is a programmer error in the scoring table; file a bug"],

            Self::PlanningNoStrategyForCategory => vec!["Add the missing category to the strategy table"],
            Self::PlanningInvalidCountRange => vec!["Fix the category→counts table entry"],

            Self::CoordinatorOverallBudgetElapsed => vec!["Increase per-agent timeouts or investigate agent latency"],
            Self::CoordinatorZeroResults => vec!["Check agent adapter connectivity"],
            Self::AgentTimeout => vec!["Increase the request's timeout_seconds or investigate the agent"],
            Self::AgentTransportError => vec!["Check network connectivity to the agent endpoint"],
            Self::AgentParseError => vec!["Inspect the raw agent response in the audit trail"],
            Self::AgentValidationError => vec!["Inspect the agent response against its expected schema"],

            Self::GenerationBatchTimeout => vec!["Increase the category's per-batch timeout or reduce batch_size"],
            Self::GenerationParseFailed => vec!["Inspect the raw completion in the audit trail; the JSON-coercion retry already ran once"],
            Self::GenerationDuplicateTestId => vec!["Inspect the prompt's already-emitted test_id list for a bug"],
            Self::GenerationUndercount => vec!["Re-run generation; do not pad with synthetic tests"],
            Self::GenerationOvercount => vec!["Re-run generation; do not truncate the returned tests"],

            Self::ValidationCountOutOfRange => vec!["Re-run generation to match the planner's range"],
            Self::ValidationIdFormatInvalid => vec!["Fix the generator's ID assignment"],
            Self::ValidationIdNotContiguous => vec!["Fix the generator's running produced-count tracking"],
            Self::ValidationTraceabilityMissing => vec!["Ensure every generated test cites at least one URS requirement token"],
            Self::ValidationCategoryCoverageMissing => vec!["Prompt the generator to include the missing required category"],
            Self::ValidationRegulatoryBasisInvalid => vec!["Restrict regulatory_basis values to the allowed set"],
            Self::ValidationComplianceFlagFalse => vec!["Investigate which compliance computation returned false"],

            Self::AuditChainBroken => vec!["Treat the audit store as compromised; do not trust suite outputs written after the break"],
            Self::AuditStorageFailure => vec!["Check AUDIT_DIR permissions and disk space"],
            Self::AuditSerializationFailure => vec!["File a bug; canonical serialization should never fail for these types"],
        }
    }

    #[must_use]
    pub fn entry(&self) -> ErrorEntry {
        ErrorEntry {
            code: self.code_string(),
            category: self.category(),
            message: self.message().to_string(),
            remediation: self.remediation().into_iter().map(String::from).collect(),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code_string(), self.message())
    }
}

/// High-level error category, derived from the code's numeric range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Config,
    Categorization,
    Planning,
    Coordination,
    Generation,
    Validation,
    Audit,
}

/// Full metadata for one error code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub code: String,
    pub category: ErrorCategory,
    pub message: String,
    pub remediation: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_strings_are_stable_and_zero_padded() {
        assert_eq!(ErrorCode::ConfigMissingLlmModel.code_string(), "OQ-E001");
        assert_eq!(ErrorCode::CategorizationEmptyInput.code_string(), "OQ-E100");
        assert_eq!(ErrorCode::AuditChainBroken.code_string(), "OQ-E600");
    }

    #[test]
    fn category_matches_code_range() {
        assert_eq!(ErrorCode::ValidationCountOutOfRange.category(), ErrorCategory::Validation);
        assert_eq!(ErrorCode::AgentTimeout.category(), ErrorCategory::Coordination);
    }

    #[test]
    fn every_code_has_nonempty_remediation() {
        for code in [
            ErrorCode::ConfigMissingLlmModel,
            ErrorCode::CategorizationNoPositiveScore,
            ErrorCode::PlanningNoStrategyForCategory,
            ErrorCode::CoordinatorOverallBudgetElapsed,
            ErrorCode::GenerationUndercount,
            ErrorCode::ValidationComplianceFlagFalse,
            ErrorCode::AuditChainBroken,
        ] {
            assert!(!code.entry().remediation.is_empty(), "{code} missing remediation");
        }
    }
}
