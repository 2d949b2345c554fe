//! Data model shared by every OCE component (categorization through audit).
//!
//! All entities here are immutable once constructed; a component that
//! needs to "mutate" one emits a new value with a new identifier and a
//! `correlation_id` link instead of mutating in place.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// GAMP-5 system category. "2" is intentionally absent in modern GAMP-5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum GampCategory {
    /// Infrastructure software.
    Cat1,
    /// Non-configured COTS.
    Cat3,
    /// Configured product.
    Cat4,
    /// Custom/bespoke application.
    Cat5,
}

impl GampCategory {
    pub const ALL: [GampCategory; 4] = [
        GampCategory::Cat1,
        GampCategory::Cat3,
        GampCategory::Cat4,
        GampCategory::Cat5,
    ];

    pub fn as_u8(self) -> u8 {
        match self {
            GampCategory::Cat1 => 1,
            GampCategory::Cat3 => 3,
            GampCategory::Cat4 => 4,
            GampCategory::Cat5 => 5,
        }
    }
}

impl From<GampCategory> for u8 {
    fn from(c: GampCategory) -> u8 {
        c.as_u8()
    }
}

impl TryFrom<u8> for GampCategory {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(GampCategory::Cat1),
            3 => Ok(GampCategory::Cat3),
            4 => Ok(GampCategory::Cat4),
            5 => Ok(GampCategory::Cat5),
            other => Err(format!("not a valid GAMP category: {other} (2 is never valid)")),
        }
    }
}

impl std::fmt::Display for GampCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Input document: a User Requirements Specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrsDocument {
    pub document_id: String,
    pub name: String,
    pub content: String,
}

impl UrsDocument {
    pub fn new(document_id: impl Into<String>, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            name: name.into(),
            content: content.into(),
        }
    }
}

/// A single indicator match used in the Categorizer's scoring trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceEntry {
    pub indicator: String,
    pub weight: i32,
    pub matched_text: String,
    pub negated: bool,
}

/// Output of the Categorizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorizationResult {
    pub category: GampCategory,
    pub confidence: f64,
    pub evidence: Vec<EvidenceEntry>,
    pub review_required: bool,
    pub is_ambiguous: bool,
    pub dominance_gap: f64,
    /// True only when an LLM-assisted re-scoring pass ran and fell back to
    /// keyword-only scoring mid-call (spec §4.1 failure semantics). The
    /// shipped keyword-only scorer never sets this.
    pub degraded: bool,
    pub correlation_id: String,
}

/// Deterministic OQ strategy derived from GAMP category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// GAMP-5 guidance for category 1 test depth is sparse; this is the
    /// implementer's best-effort reading of the framework, not a settled
    /// industry number (see DESIGN.md Open Questions).
    Minimal,
    Standard,
    Rigorous,
    FullSdlc,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Strategy::Minimal => "minimal",
            Strategy::Standard => "standard",
            Strategy::Rigorous => "rigorous",
            Strategy::FullSdlc => "full_sdlc",
        };
        write!(f, "{s}")
    }
}

/// Specialist agent kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Context,
    Research,
    Sme,
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgentKind::Context => "context",
            AgentKind::Research => "research",
            AgentKind::Sme => "sme",
        };
        write!(f, "{s}")
    }
}

/// Priority hint carried on an SME request when a URS was flagged for
/// human review by the Categorizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestPriority {
    Normal,
    High,
}

/// Kind-specific payload for an `AgentRequest`. `gamp_category` is always
/// serialized as a string inside each payload (spec §3 invariant: "always
/// serialized as a string to satisfy downstream schemas").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentRequestPayload {
    Context(ContextPayload),
    Research(ResearchPayload),
    Sme(SmePayload),
}

impl AgentRequestPayload {
    pub fn kind(&self) -> AgentKind {
        match self {
            AgentRequestPayload::Context(_) => AgentKind::Context,
            AgentRequestPayload::Research(_) => AgentKind::Research,
            AgentRequestPayload::Sme(_) => AgentKind::Sme,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextPayload {
    pub gamp_category: String,
    pub urs_excerpt: String,
    pub collections: Vec<String>,
    pub top_k: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchPayload {
    pub gamp_category: String,
    pub urs_excerpt: String,
    pub regulatory_sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmePayload {
    pub gamp_category: String,
    pub urs_excerpt: String,
    pub priority: RequestPriority,
}

/// One specialist request fanned out by the Coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequest {
    pub request_id: String,
    pub correlation_id: String,
    pub payload: AgentRequestPayload,
    pub timeout_seconds: u64,
}

impl AgentRequest {
    pub fn agent_kind(&self) -> AgentKind {
        self.payload.kind()
    }
}

/// Structured error carried by a failed `AgentResult`.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct AgentError {
    pub kind: AgentErrorKind,
    pub message: String,
    pub context: BTreeMap<String, String>,
    pub correlation_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentErrorKind {
    Timeout,
    Transport,
    Parse,
    Validation,
}

impl std::fmt::Display for AgentErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgentErrorKind::Timeout => "timeout",
            AgentErrorKind::Transport => "transport",
            AgentErrorKind::Parse => "parse",
            AgentErrorKind::Validation => "validation",
        };
        write!(f, "{s}")
    }
}

/// Kind-specific success payload for an `AgentResult`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentResultData {
    Context { snippets: Vec<RetrievedSnippet> },
    Research { findings: Vec<RegulatoryFinding> },
    Sme { assessment: String, citations: Vec<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedSnippet {
    pub doc_id: String,
    pub score: f64,
    pub collection: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegulatoryFinding {
    pub source: String,
    pub title: String,
    pub summary: String,
}

/// Response to one `AgentRequest`. `data` is present iff `success`; `error`
/// is present iff not. Neither side is ever defaulted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub request_id: String,
    pub agent_kind: AgentKind,
    pub success: bool,
    pub data: Option<AgentResultData>,
    pub error: Option<AgentError>,
    pub elapsed_seconds: f64,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
}

impl AgentResult {
    pub fn ok(
        request_id: impl Into<String>,
        agent_kind: AgentKind,
        data: AgentResultData,
        started_at: chrono::DateTime<chrono::Utc>,
        finished_at: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            agent_kind,
            success: true,
            data: Some(data),
            error: None,
            elapsed_seconds: elapsed_secs(started_at, finished_at),
            started_at,
            finished_at,
        }
    }

    pub fn err(
        request_id: impl Into<String>,
        agent_kind: AgentKind,
        error: AgentError,
        started_at: chrono::DateTime<chrono::Utc>,
        finished_at: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            agent_kind,
            success: false,
            data: None,
            error: Some(error),
            elapsed_seconds: elapsed_secs(started_at, finished_at),
            started_at,
            finished_at,
        }
    }
}

fn elapsed_secs(started_at: chrono::DateTime<chrono::Utc>, finished_at: chrono::DateTime<chrono::Utc>) -> f64 {
    (finished_at - started_at).num_milliseconds().max(0) as f64 / 1000.0
}

/// Wrapper passed to the Generator so the downstream step accepts a single
/// event type (spec §3: "Exists because the downstream step accepts a
/// single event type").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResultsBundle {
    pub results: Vec<AgentResult>,
    pub success_count: usize,
    pub total_count: usize,
}

impl AgentResultsBundle {
    /// Sorts results by `(agent_kind, request_id)` for determinism across
    /// reruns on identical inputs (spec §4.3 ordering guarantee).
    pub fn new(mut results: Vec<AgentResult>) -> Self {
        results.sort_by(|a, b| a.agent_kind.cmp(&b.agent_kind).then_with(|| a.request_id.cmp(&b.request_id)));
        let success_count = results.iter().filter(|r| r.success).count();
        let total_count = results.len();
        Self {
            results,
            success_count,
            total_count,
        }
    }
}

/// Output of the Planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRequest {
    pub correlation_id: String,
    pub category: GampCategory,
    pub strategy: Strategy,
    pub required_test_types: BTreeSet<String>,
    pub compliance_tags: BTreeSet<String>,
    pub target_test_count_range: (u32, u32),
    pub coordination_requests: Vec<AgentRequest>,
}

/// One executable step within a `TestCase`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestStep {
    pub action: String,
    pub expected_result: String,
    #[serde(default)]
    pub data: Option<String>,
}

/// Category of a generated OQ test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestCategory {
    Installation,
    Functional,
    Performance,
    Security,
    DataIntegrity,
    Integration,
}

impl std::fmt::Display for TestCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TestCategory::Installation => "installation",
            TestCategory::Functional => "functional",
            TestCategory::Performance => "performance",
            TestCategory::Security => "security",
            TestCategory::DataIntegrity => "data_integrity",
            TestCategory::Integration => "integration",
        };
        write!(f, "{s}")
    }
}

/// One unit of generator output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub test_id: String,
    pub title: String,
    pub objective: String,
    pub prerequisites: Vec<String>,
    pub steps: Vec<TestStep>,
    pub acceptance_criteria: Vec<String>,
    pub regulatory_basis: Vec<String>,
    pub traceability: Vec<String>,
    pub category: TestCategory,
}

/// Raw, unvalidated generator output (batches concatenated, not yet
/// admitted by the Validator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteDraft {
    pub tests: Vec<TestCase>,
    pub metadata: DraftMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftMetadata {
    pub batches_attempted: u32,
    pub category: GampCategory,
    pub correlation_id: String,
}

/// Compliance-flag set; the Validator requires all three true.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ComplianceFlags {
    pub alcoa_plus: bool,
    pub gamp5: bool,
    pub cfr_part_11: bool,
}

impl ComplianceFlags {
    pub fn all_true(self) -> bool {
        self.alcoa_plus && self.gamp5 && self.cfr_part_11
    }
}

/// Generation/validation provenance persisted alongside a suite (the
/// `metadata` top-level key of the persisted test suite document).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteMetadata {
    pub correlation_id: String,
    pub strategy: Strategy,
    pub batches_attempted: u32,
    pub generated_at_utc: String,
}

/// Validator output: an admitted OQ test suite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OqTestSuite {
    pub suite_id: String,
    pub gamp_category: GampCategory,
    pub tests: Vec<TestCase>,
    pub coverage_by_category: BTreeMap<String, u32>,
    pub compliance_flags: ComplianceFlags,
    pub metadata: SuiteMetadata,
}

/// One entry in the Auditor's content-addressed, append-only chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub seq: u64,
    pub timestamp_utc: chrono::DateTime<chrono::Utc>,
    pub actor: String,
    pub action: String,
    pub parent_hash: String,
    pub record_hash: String,
    pub correlation_id: String,
    pub payload: serde_json::Value,
}
