//! OTLP span export (spec §6 Observability).
//!
//! Spans carry `workflow.id`, `workflow.step`, `gamp.category`,
//! `compliance.alcoa_plus`, `correlation_id`. Export failures never halt
//! the workflow; they're logged to the audit store by the caller.

use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing::warn;

/// Attributes attached to every exported span, per spec §6.
#[derive(Debug, Clone)]
pub struct SpanAttributes {
    pub workflow_id: String,
    pub workflow_step: String,
    pub gamp_category: String,
    pub correlation_id: String,
}

impl SpanAttributes {
    pub fn as_key_values(&self) -> Vec<KeyValue> {
        vec![
            KeyValue::new("workflow.id", self.workflow_id.clone()),
            KeyValue::new("workflow.step", self.workflow_step.clone()),
            KeyValue::new("gamp.category", self.gamp_category.clone()),
            KeyValue::new("compliance.alcoa_plus", true),
            KeyValue::new("correlation_id", self.correlation_id.clone()),
        ]
    }
}

/// Builds an OTLP tracer provider pointed at `endpoint`. Returns `None`
/// (rather than a constructed-but-broken provider) when the exporter
/// can't be built, so the caller can log and continue without spans
/// rather than fail the workflow.
pub fn build_tracer_provider(endpoint: &str) -> Option<SdkTracerProvider> {
    let exporter = match opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
    {
        Ok(exporter) => exporter,
        Err(err) => {
            warn!(%endpoint, error = %err, "failed to build OTLP span exporter; observability disabled for this run");
            return None;
        }
    };

    Some(SdkTracerProvider::builder().with_batch_exporter(exporter).build())
}

pub fn shutdown(provider: &SdkTracerProvider) {
    if let Err(err) = provider.shutdown() {
        warn!(error = %err, "OTLP tracer provider shutdown reported an error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_attributes_always_carry_alcoa_plus_true() {
        let attrs = SpanAttributes {
            workflow_id: "wf-1".to_string(),
            workflow_step: "categorize".to_string(),
            gamp_category: "4".to_string(),
            correlation_id: "corr-1".to_string(),
        };
        let kvs = attrs.as_key_values();
        let alcoa = kvs.iter().find(|kv| kv.key.as_str() == "compliance.alcoa_plus").unwrap();
        assert_eq!(alcoa.value.to_string(), "true");
    }

    #[tokio::test]
    async fn unreachable_endpoint_returns_none_instead_of_panicking() {
        // with_tonic()'s channel is lazy, so this should still construct
        // successfully at the client level; this test guards against a
        // future regression where malformed endpoints panic instead of
        // returning None. Building the lazy channel spawns onto the
        // current reactor, so this needs a tokio runtime context.
        let provider = build_tracer_provider("http://localhost:4317");
        assert!(provider.is_some());
    }
}
