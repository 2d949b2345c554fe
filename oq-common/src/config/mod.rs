//! Configuration system for the OQ orchestration engine.
//!
//! Provides environment variable parsing with type safety, error
//! collection, and source tracking, plus the top-level [`WorkflowConfig`]
//! that a CLI invocation resolves once at startup.

pub mod env;
pub mod workflow;

pub use env::{EnvError, EnvParser};
pub use workflow::WorkflowConfig;

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Environment,
    Default,
}

/// A configuration value tagged with its provenance, so a run's audit
/// trail can record whether a setting was explicit or defaulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sourced<T> {
    pub value: T,
    pub source: ConfigSource,
    pub env_var: Option<String>,
}

impl<T> Sourced<T> {
    pub fn from_env(value: T, var_name: String) -> Self {
        Self {
            value,
            source: ConfigSource::Environment,
            env_var: Some(var_name),
        }
    }

    pub fn default_value(value: T) -> Self {
        Self {
            value,
            source: ConfigSource::Default,
            env_var: None,
        }
    }
}

#[cfg(test)]
pub(crate) fn env_test_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap()
}
