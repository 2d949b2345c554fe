//! Error catalog and top-level error type for the OQ orchestration engine.
//!
//! This module provides a comprehensive error catalog with unique error
//! codes, categorized by subsystem, and the [`OceError`] enum that each
//! pipeline stage returns.
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

pub mod catalog;

pub use catalog::{ErrorCategory, ErrorCode, ErrorEntry};

use crate::types::AgentError;
use std::collections::BTreeMap;

/// Top-level error produced by any OCE pipeline stage (spec §7).
///
/// Every variant carries the stable [`ErrorCode`], a human-readable
/// `message`, free-form `context` for diagnostics, and a `correlation_id`
/// tying the failure back to the run that produced it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OceError {
    #[error("{code}: {message}")]
    Categorization {
        code: ErrorCode,
        message: String,
        context: BTreeMap<String, String>,
        correlation_id: String,
    },

    #[error("{code}: {message}")]
    Planning {
        code: ErrorCode,
        message: String,
        context: BTreeMap<String, String>,
        correlation_id: String,
    },

    #[error("{code}: {message}")]
    Coordinator {
        code: ErrorCode,
        message: String,
        context: BTreeMap<String, String>,
        correlation_id: String,
    },

    #[error("{code}: agent failure: {source}")]
    Agent {
        code: ErrorCode,
        #[source]
        source: AgentError,
        correlation_id: String,
    },

    #[error("{code}: {message}")]
    Generation {
        code: ErrorCode,
        message: String,
        context: BTreeMap<String, String>,
        correlation_id: String,
    },

    #[error("{code}: validation failed with {} violation(s)", violations.len())]
    Validation {
        code: ErrorCode,
        violations: Vec<String>,
        correlation_id: String,
    },

    #[error("{code}: {message}")]
    Audit {
        code: ErrorCode,
        message: String,
        context: BTreeMap<String, String>,
        correlation_id: String,
    },

    #[error("{code}: {message}")]
    Config {
        code: ErrorCode,
        message: String,
        context: BTreeMap<String, String>,
    },
}

impl OceError {
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            OceError::Categorization { code, .. }
            | OceError::Planning { code, .. }
            | OceError::Coordinator { code, .. }
            | OceError::Agent { code, .. }
            | OceError::Generation { code, .. }
            | OceError::Validation { code, .. }
            | OceError::Audit { code, .. }
            | OceError::Config { code, .. } => *code,
        }
    }

    #[must_use]
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            OceError::Categorization { correlation_id, .. }
            | OceError::Planning { correlation_id, .. }
            | OceError::Coordinator { correlation_id, .. }
            | OceError::Agent { correlation_id, .. }
            | OceError::Generation { correlation_id, .. }
            | OceError::Validation { correlation_id, .. }
            | OceError::Audit { correlation_id, .. } => Some(correlation_id),
            OceError::Config { .. } => None,
        }
    }

    pub fn config(code: ErrorCode, message: impl Into<String>) -> Self {
        OceError::Config {
            code,
            message: message.into(),
            context: BTreeMap::new(),
        }
    }

    pub fn validation(code: ErrorCode, violations: Vec<String>, correlation_id: impl Into<String>) -> Self {
        OceError::Validation {
            code,
            violations,
            correlation_id: correlation_id.into(),
        }
    }
}
