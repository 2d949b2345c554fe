//! Tamper-evident, append-only audit chain (spec §4.6).
//!
//! Grounded on the teacher's append-only build-history persistence
//! pattern (load-on-start, append, single-writer monitor) and the
//! broadcast-based `oqd::events::EventBus` for a side-channel fan-out of
//! the same records to any live subscriber.

use crate::canonical::to_canonical_string;
use chrono::Utc;
use oq_common::errors::{ErrorCode, OceError};
use oq_common::io::append_audit_record;
use oq_common::types::AuditRecord;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::Mutex;

/// Hash of the constant genesis parent for `seq == 0`.
// 80 hex chars: longer than a real 64-char BLAKE3 digest, so it can never collide with one.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000000000000000";

/// Single-writer, content-addressed audit store (spec §5: "the audit
/// store is the only process-wide sink... a single writer").
pub struct AuditStore {
    inner: Mutex<AuditStoreState>,
    audit_dir: PathBuf,
}

struct AuditStoreState {
    next_seq: u64,
    last_hash: String,
    records: Vec<AuditRecord>,
}

impl AuditStore {
    pub fn new(audit_dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: Mutex::new(AuditStoreState {
                next_seq: 0,
                last_hash: GENESIS_HASH.to_string(),
                records: Vec::new(),
            }),
            audit_dir: audit_dir.into(),
        }
    }

    /// Appends one record, computing its `seq`, `parent_hash`, and
    /// `record_hash`, persisting it to the JSONL store, and returning the
    /// assigned `seq`. Storage failure raises `AuditFailure`, which the
    /// caller must treat as halting the workflow (spec §4.6).
    pub async fn append(&self, actor: &str, action: &str, correlation_id: &str, payload: serde_json::Value) -> Result<u64, OceError> {
        let mut state = self.inner.lock().await;

        let seq = state.next_seq;
        let parent_hash = state.last_hash.clone();
        let timestamp_utc = Utc::now();

        let mut record = AuditRecord {
            seq,
            timestamp_utc,
            actor: actor.to_string(),
            action: action.to_string(),
            parent_hash: parent_hash.clone(),
            record_hash: String::new(),
            correlation_id: correlation_id.to_string(),
            payload,
        };

        record.record_hash = hash_record(&record);

        let date_utc = timestamp_utc.format("%Y%m%d").to_string();
        append_audit_record(&self.audit_dir, &date_utc, &record)?;

        state.last_hash = record.record_hash.clone();
        state.next_seq += 1;
        state.records.push(record);

        Ok(seq)
    }

    /// Verifies the in-memory chain: every record's `parent_hash` matches
    /// its predecessor's `record_hash`, and every `record_hash` is the
    /// correct hash of its own content (spec's testable chain-integrity
    /// property).
    pub async fn verify_chain(&self) -> Result<(), OceError> {
        let state = self.inner.lock().await;
        let mut expected_parent = GENESIS_HASH.to_string();

        for record in &state.records {
            if record.parent_hash != expected_parent {
                return Err(chain_broken(record.seq, correlation_id_of(record)));
            }
            let recomputed = hash_record(record);
            if recomputed != record.record_hash {
                return Err(chain_broken(record.seq, correlation_id_of(record)));
            }
            expected_parent = record.record_hash.clone();
        }

        Ok(())
    }

    pub async fn records_snapshot(&self) -> Vec<AuditRecord> {
        self.inner.lock().await.records.clone()
    }
}

fn correlation_id_of(record: &AuditRecord) -> &str {
    &record.correlation_id
}

fn chain_broken(seq: u64, correlation_id: &str) -> OceError {
    OceError::Audit {
        code: ErrorCode::AuditChainBroken,
        message: format!("audit chain broken at seq={seq}"),
        context: BTreeMap::new(),
        correlation_id: correlation_id.to_string(),
    }
}

/// `record_hash = H(serialize(record \ {record_hash}))`, with `H` =
/// BLAKE3 (a 256-bit collision-resistant hash; spec leaves the choice to
/// the implementer).
fn hash_record(record: &AuditRecord) -> String {
    let hashable = serde_json::json!({
        "seq": record.seq,
        "timestamp_utc": record.timestamp_utc.to_rfc3339(),
        "actor": record.actor,
        "action": record.action,
        "parent_hash": record.parent_hash,
        "correlation_id": record.correlation_id,
        "payload": record.payload,
    });
    let canonical = to_canonical_string(&hashable);
    blake3::hash(canonical.as_bytes()).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn first_record_chains_from_genesis() {
        let dir = tempfile::tempdir().unwrap();
        let store = AuditStore::new(dir.path());
        let seq = store.append("categorizer", "categorized", "corr-1", json!({"category": 4})).await.unwrap();
        assert_eq!(seq, 0);

        let records = store.records_snapshot().await;
        assert_eq!(records[0].parent_hash, GENESIS_HASH);
    }

    #[tokio::test]
    async fn seq_is_strictly_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let store = AuditStore::new(dir.path());
        let s0 = store.append("a", "action1", "corr-1", json!({})).await.unwrap();
        let s1 = store.append("a", "action2", "corr-1", json!({})).await.unwrap();
        let s2 = store.append("a", "action3", "corr-1", json!({})).await.unwrap();
        assert_eq!((s0, s1, s2), (0, 1, 2));
    }

    #[tokio::test]
    async fn chain_links_parent_hash_to_prior_record_hash() {
        let dir = tempfile::tempdir().unwrap();
        let store = AuditStore::new(dir.path());
        store.append("a", "first", "corr-1", json!({"x": 1})).await.unwrap();
        store.append("a", "second", "corr-1", json!({"x": 2})).await.unwrap();

        let records = store.records_snapshot().await;
        assert_eq!(records[1].parent_hash, records[0].record_hash);
        store.verify_chain().await.unwrap();
    }

    #[tokio::test]
    async fn reserializing_a_record_yields_the_same_hash() {
        let dir = tempfile::tempdir().unwrap();
        let store = AuditStore::new(dir.path());
        store.append("a", "action", "corr-1", json!({"k": "v", "n": 1})).await.unwrap();

        let records = store.records_snapshot().await;
        let recomputed = hash_record(&records[0]);
        assert_eq!(recomputed, records[0].record_hash);
    }

    #[tokio::test]
    async fn tampering_with_a_record_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let store = AuditStore::new(dir.path());
        store.append("a", "first", "corr-1", json!({})).await.unwrap();
        store.append("a", "second", "corr-1", json!({})).await.unwrap();

        {
            let mut state = store.inner.lock().await;
            state.records[0].action = "tampered".to_string();
        }

        let result = store.verify_chain().await;
        assert!(result.is_err());
    }
}
