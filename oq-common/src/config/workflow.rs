//! Top-level configuration resolved once at CLI startup (spec §6).

use super::{EnvParser, Sourced};
use crate::errors::{ErrorCode, OceError};
use std::path::PathBuf;

/// Resolved configuration for one `oq run` invocation.
///
/// Layering is CLI flag (handled by the caller) > environment variable >
/// built-in default. Unknown environment variables are ignored; only the
/// five named here are recognized.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub llm_model: String,
    /// HTTP endpoint for the completion adapter. Absent means no real LLM
    /// is reachable; the CLI falls back to a mock client rather than fail,
    /// matching how `VECTOR_STORE_URL`/`OTLP_ENDPOINT` absence is handled.
    pub llm_endpoint: Option<String>,
    pub llm_timeout_seconds: u64,
    pub vector_store_url: Option<String>,
    pub otlp_endpoint: Option<String>,
    pub audit_dir: PathBuf,
}

impl WorkflowConfig {
    /// Resolves configuration from the process environment.
    ///
    /// `LLM_MODEL` is required; its absence is the only condition under
    /// which this returns `Err` rather than falling back to a default.
    pub fn from_env() -> Result<Self, OceError> {
        let mut parser = EnvParser::new();

        let llm_model: Sourced<Option<String>> = parser.get_optional_string("LLM_MODEL");
        let llm_model = llm_model.value.ok_or_else(|| {
            OceError::config(ErrorCode::ConfigMissingLlmModel, ErrorCode::ConfigMissingLlmModel.message())
        })?;

        let llm_endpoint = parser.get_optional_string("LLM_ENDPOINT");
        let llm_timeout_seconds = parser.get_u64_range("LLM_TIMEOUT_SECONDS", 60, 1, 3600);
        let vector_store_url = parser.get_optional_string("VECTOR_STORE_URL");
        let otlp_endpoint = parser.get_optional_string("OTLP_ENDPOINT");
        let audit_dir = parser.get_path("AUDIT_DIR", "logs/audit", false);

        if parser.has_errors() {
            let context = parser
                .take_errors()
                .into_iter()
                .enumerate()
                .map(|(i, e)| (format!("error_{i}"), e.to_string()))
                .collect();
            return Err(OceError::Config {
                code: ErrorCode::ConfigInvalidTimeout,
                message: "one or more environment variables failed validation".to_string(),
                context,
            });
        }

        Ok(Self {
            llm_model,
            llm_endpoint: llm_endpoint.value,
            llm_timeout_seconds: llm_timeout_seconds.value,
            vector_store_url: vector_store_url.value,
            otlp_endpoint: otlp_endpoint.value,
            audit_dir: audit_dir.value,
        })
    }
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use crate::config::env_test_lock;
    use std::env;

    fn cleanup() {
        for var in ["LLM_MODEL", "LLM_TIMEOUT_SECONDS", "VECTOR_STORE_URL", "OTLP_ENDPOINT", "AUDIT_DIR"] {
            // SAFETY: serialized via env_test_lock
            unsafe { env::remove_var(var) };
        }
    }

    #[test]
    fn missing_llm_model_is_an_error() {
        let _guard = env_test_lock();
        cleanup();
        let result = WorkflowConfig::from_env();
        assert!(result.is_err());
        cleanup();
    }

    #[test]
    fn defaults_apply_when_only_required_var_is_set() {
        let _guard = env_test_lock();
        cleanup();
        // SAFETY: serialized via env_test_lock
        unsafe { env::set_var("LLM_MODEL", "gpt-4o") };
        let config = WorkflowConfig::from_env().expect("should resolve with only LLM_MODEL set");
        assert_eq!(config.llm_model, "gpt-4o");
        assert_eq!(config.llm_timeout_seconds, 60);
        assert!(config.vector_store_url.is_none());
        cleanup();
    }
}
