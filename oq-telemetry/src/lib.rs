//! Audit hash-chain store and OTLP span export for the OQ orchestration
//! engine (spec §4.6, §6 Observability).

pub mod audit;
pub mod canonical;
pub mod otlp;

pub use audit::{AuditStore, GENESIS_HASH};
pub use otlp::SpanAttributes;
