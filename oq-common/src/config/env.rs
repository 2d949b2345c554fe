//! Environment variable parsing with type safety.
//!
//! Provides a type-safe parser for the OCE's environment variables with
//! validation, error collection, and source tracking. Unlike a typical
//! product-prefixed config layer, the variable names here are the bare
//! names a pharma validation operator expects to set directly
//! (`LLM_MODEL`, `AUDIT_DIR`, ...), so the parser carries no prefix.

use super::{ConfigSource, Sourced};
use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during environment variable parsing.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("Invalid value for {var}: expected {expected}, got '{value}'")]
    InvalidValue {
        var: String,
        expected: String,
        value: String,
    },

    #[error("Path not found for {var}: {path}")]
    PathNotFound { var: String, path: PathBuf },

    #[error("Value out of range for {var}: {value} (valid: {min}..={max})")]
    OutOfRange {
        var: String,
        value: String,
        min: String,
        max: String,
    },

    #[error("Invalid log level for {var}: {value}")]
    InvalidLogLevel { var: String, value: String },
}

/// Type-safe environment variable parser.
///
/// Collects errors during parsing so all issues can be reported at once
/// rather than failing on the first bad variable.
pub struct EnvParser {
    errors: Vec<EnvError>,
}

impl EnvParser {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn errors(&self) -> &[EnvError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn take_errors(&mut self) -> Vec<EnvError> {
        std::mem::take(&mut self.errors)
    }

    pub fn get_string(&mut self, name: &str, default: &str) -> Sourced<String> {
        match env::var(name) {
            Ok(value) => Sourced::from_env(value, name.to_string()),
            Err(_) => Sourced::default_value(default.to_string()),
        }
    }

    /// Accepts: 1, true, yes, on (for true); 0, false, no, off, "" (for false).
    pub fn get_bool(&mut self, name: &str, default: bool) -> Sourced<bool> {
        match env::var(name) {
            Ok(value) => {
                let parsed = match value.to_lowercase().as_str() {
                    "1" | "true" | "yes" | "on" => true,
                    "0" | "false" | "no" | "off" | "" => false,
                    _ => {
                        self.errors.push(EnvError::InvalidValue {
                            var: name.to_string(),
                            expected: "boolean (true/false/1/0/yes/no)".to_string(),
                            value: value.clone(),
                        });
                        default
                    }
                };
                Sourced::from_env(parsed, name.to_string())
            }
            Err(_) => Sourced::default_value(default),
        }
    }

    pub fn get_u32_range(&mut self, name: &str, default: u32, min: u32, max: u32) -> Sourced<u32> {
        match env::var(name) {
            Ok(value) => match value.parse::<u32>() {
                Ok(n) if n >= min && n <= max => Sourced::from_env(n, name.to_string()),
                Ok(n) => {
                    self.errors.push(EnvError::OutOfRange {
                        var: name.to_string(),
                        value: n.to_string(),
                        min: min.to_string(),
                        max: max.to_string(),
                    });
                    Sourced::from_env(default, name.to_string())
                }
                Err(_) => {
                    self.errors.push(EnvError::InvalidValue {
                        var: name.to_string(),
                        expected: "unsigned 32-bit integer".to_string(),
                        value,
                    });
                    Sourced::default_value(default)
                }
            },
            Err(_) => Sourced::default_value(default),
        }
    }

    pub fn get_u64_range(&mut self, name: &str, default: u64, min: u64, max: u64) -> Sourced<u64> {
        match env::var(name) {
            Ok(value) => match value.parse::<u64>() {
                Ok(n) if n >= min && n <= max => Sourced::from_env(n, name.to_string()),
                Ok(n) => {
                    self.errors.push(EnvError::OutOfRange {
                        var: name.to_string(),
                        value: n.to_string(),
                        min: min.to_string(),
                        max: max.to_string(),
                    });
                    Sourced::from_env(default, name.to_string())
                }
                Err(_) => {
                    self.errors.push(EnvError::InvalidValue {
                        var: name.to_string(),
                        expected: "unsigned 64-bit integer".to_string(),
                        value,
                    });
                    Sourced::default_value(default)
                }
            },
            Err(_) => Sourced::default_value(default),
        }
    }

    pub fn get_f64_range(&mut self, name: &str, default: f64, min: f64, max: f64) -> Sourced<f64> {
        match env::var(name) {
            Ok(value) => match value.parse::<f64>() {
                Ok(n) if n >= min && n <= max => Sourced::from_env(n, name.to_string()),
                Ok(n) => {
                    self.errors.push(EnvError::OutOfRange {
                        var: name.to_string(),
                        value: n.to_string(),
                        min: min.to_string(),
                        max: max.to_string(),
                    });
                    Sourced::from_env(default, name.to_string())
                }
                Err(_) => {
                    self.errors.push(EnvError::InvalidValue {
                        var: name.to_string(),
                        expected: "floating-point number".to_string(),
                        value,
                    });
                    Sourced::default_value(default)
                }
            },
            Err(_) => Sourced::default_value(default),
        }
    }

    /// Gets a path value, expanding a leading `~/` against `$HOME`.
    ///
    /// If `must_exist` is true, records an error if the path doesn't exist.
    pub fn get_path(&mut self, name: &str, default: &str, must_exist: bool) -> Sourced<PathBuf> {
        let (value, source) = match env::var(name) {
            Ok(v) => (v, ConfigSource::Environment),
            Err(_) => (default.to_string(), ConfigSource::Default),
        };

        let expanded = if let Some(stripped) = value.strip_prefix("~/") {
            match env::var("HOME") {
                Ok(home) => PathBuf::from(home).join(stripped),
                Err(_) => PathBuf::from(&value),
            }
        } else {
            PathBuf::from(&value)
        };

        if must_exist && !expanded.exists() {
            self.errors.push(EnvError::PathNotFound {
                var: name.to_string(),
                path: expanded.clone(),
            });
        }

        if source == ConfigSource::Environment {
            Sourced::from_env(expanded, name.to_string())
        } else {
            Sourced::default_value(expanded)
        }
    }

    pub fn get_log_level(&mut self, name: &str, default: &str) -> Sourced<String> {
        match env::var(name) {
            Ok(value) => {
                let lower = value.to_lowercase();
                match lower.as_str() {
                    "trace" | "debug" | "info" | "warn" | "error" | "off" => Sourced::from_env(lower, name.to_string()),
                    _ => {
                        self.errors.push(EnvError::InvalidLogLevel {
                            var: name.to_string(),
                            value: value.clone(),
                        });
                        Sourced::from_env(default.to_string(), name.to_string())
                    }
                }
            }
            Err(_) => Sourced::default_value(default.to_string()),
        }
    }

    pub fn get_string_list(&mut self, name: &str, default: Vec<String>) -> Sourced<Vec<String>> {
        match env::var(name) {
            Ok(value) if value.is_empty() => Sourced::from_env(Vec::new(), name.to_string()),
            Ok(value) => {
                let items: Vec<String> = value.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
                Sourced::from_env(items, name.to_string())
            }
            Err(_) => Sourced::default_value(default),
        }
    }

    pub fn get_optional_string(&mut self, name: &str) -> Sourced<Option<String>> {
        match env::var(name) {
            Ok(value) if value.is_empty() => Sourced::from_env(None, name.to_string()),
            Ok(value) => Sourced::from_env(Some(value), name.to_string()),
            Err(_) => Sourced::default_value(None),
        }
    }
}

impl Default for EnvParser {
    fn default() -> Self {
        Self::new()
    }
}
