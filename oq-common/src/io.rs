//! URS ingestion, atomic test-suite output, and audit JSONL persistence
//! (spec §6 External Interfaces).

use crate::errors::{ErrorCode, OceError};
use crate::types::{AuditRecord, OqTestSuite};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default character budget used when truncating a URS document for
/// prompt construction. Within the spec's stated 3000-8000 range.
pub const DEFAULT_PROMPT_BUDGET: usize = 6000;

/// A URS document read from disk, split into the form used for prompting
/// (truncated) and the form retained for audit (full).
#[derive(Debug, Clone)]
pub struct IngestedUrs {
    pub document_id: String,
    pub full_content: String,
    pub prompt_excerpt: String,
    pub truncated: bool,
}

/// Reads a URS file as UTF-8 text and truncates it to `budget` chars only
/// for prompt construction; the full content is always returned too so
/// callers can retain it in the audit trail untouched.
pub fn ingest_urs(path: &Path, budget: usize) -> Result<IngestedUrs, OceError> {
    let full_content = fs::read_to_string(path).map_err(|e| {
        OceError::config(
            ErrorCode::ConfigUnreadableUrs,
            format!("{}: {e}", ErrorCode::ConfigUnreadableUrs.message()),
        )
    })?;

    let document_id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("urs")
        .to_string();

    let (prompt_excerpt, truncated) = truncate_chars(&full_content, budget);

    Ok(IngestedUrs {
        document_id,
        full_content,
        prompt_excerpt,
        truncated,
    })
}

fn truncate_chars(content: &str, budget: usize) -> (String, bool) {
    if content.chars().count() <= budget {
        return (content.to_string(), false);
    }
    (content.chars().take(budget).collect(), true)
}

/// Writes the test suite JSON atomically: serialize to a sibling temp
/// file in the same directory, then rename over the final path so a
/// reader never observes a partially written document.
pub fn write_test_suite_atomic(output_dir: &Path, suite: &OqTestSuite, generated_at_utc: &str) -> Result<PathBuf, OceError> {
    fs::create_dir_all(output_dir).map_err(|e| audit_storage_error(format!("creating output dir: {e}")))?;

    let file_name = format!("test_suite_{}_{}.json", suite.suite_id, generated_at_utc);
    let final_path = output_dir.join(&file_name);
    let tmp_path = output_dir.join(format!("{file_name}.tmp"));

    let body = serde_json::to_vec_pretty(suite).map_err(|e| {
        OceError::Audit {
            code: ErrorCode::AuditSerializationFailure,
            message: format!("{}: {e}", ErrorCode::AuditSerializationFailure.message()),
            context: BTreeMap::new(),
            correlation_id: suite.suite_id.clone(),
        }
    })?;

    {
        let mut f = File::create(&tmp_path).map_err(|e| audit_storage_error(format!("creating temp file: {e}")))?;
        f.write_all(&body).map_err(|e| audit_storage_error(format!("writing temp file: {e}")))?;
        f.sync_all().ok();
    }

    fs::rename(&tmp_path, &final_path).map_err(|e| audit_storage_error(format!("renaming temp file: {e}")))?;

    Ok(final_path)
}

/// Appends one audit record as a single line of newline-delimited,
/// canonically-keyed JSON. Opens in append mode so concurrent writers
/// across a single process (serialized by the Auditor's monitor, see
/// `oq-telemetry::audit`) never interleave partial lines.
pub fn append_audit_record(audit_dir: &Path, date_utc: &str, record: &AuditRecord) -> Result<(), OceError> {
    fs::create_dir_all(audit_dir).map_err(|e| audit_storage_error(format!("creating audit dir: {e}")))?;

    let path = audit_dir.join(format!("audit_{date_utc}.jsonl"));
    let line = serde_json::to_string(record).map_err(|e| OceError::Audit {
        code: ErrorCode::AuditSerializationFailure,
        message: format!("{}: {e}", ErrorCode::AuditSerializationFailure.message()),
        context: BTreeMap::new(),
        correlation_id: record.correlation_id.clone(),
    })?;

    let mut f = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| audit_storage_error(format!("opening audit file: {e}")))?;

    writeln!(f, "{line}").map_err(|e| audit_storage_error(format!("appending audit record: {e}")))?;

    Ok(())
}

fn audit_storage_error(message: String) -> OceError {
    OceError::Audit {
        code: ErrorCode::AuditStorageFailure,
        message,
        context: BTreeMap::new(),
        correlation_id: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ComplianceFlags, GampCategory, Strategy, SuiteMetadata};

    #[test]
    fn truncate_chars_leaves_short_content_untouched() {
        let (out, truncated) = truncate_chars("hello", 10);
        assert_eq!(out, "hello");
        assert!(!truncated);
    }

    #[test]
    fn truncate_chars_cuts_at_char_boundary_not_byte() {
        let content = "é".repeat(10);
        let (out, truncated) = truncate_chars(&content, 5);
        assert_eq!(out.chars().count(), 5);
        assert!(truncated);
    }

    #[test]
    fn ingest_urs_reads_full_and_truncated_forms() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urs.md");
        std::fs::write(&path, "x".repeat(100)).unwrap();

        let ingested = ingest_urs(&path, 50).unwrap();
        assert_eq!(ingested.full_content.len(), 100);
        assert_eq!(ingested.prompt_excerpt.len(), 50);
        assert!(ingested.truncated);
    }

    #[test]
    fn write_test_suite_atomic_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let suite = OqTestSuite {
            suite_id: "s1".to_string(),
            gamp_category: GampCategory::Cat4,
            tests: vec![],
            coverage_by_category: Default::default(),
            compliance_flags: ComplianceFlags {
                alcoa_plus: true,
                gamp5: true,
                cfr_part_11: true,
            },
            metadata: SuiteMetadata {
                correlation_id: "corr-1".to_string(),
                strategy: Strategy::Rigorous,
                batches_attempted: 1,
                generated_at_utc: "20260101T000000Z".to_string(),
            },
        };

        let path = write_test_suite_atomic(dir.path(), &suite, "20260101T000000Z").unwrap();
        assert!(path.exists());
        assert!(!dir.path().join(format!("{}.tmp", path.file_name().unwrap().to_str().unwrap())).exists());
    }
}
