//! `tracing`-backed observer.

use std::time::Instant;

use serde_json::Value;
use tracing::{Level, Span, field, span};

use super::{Observer, ObserverSpan, RunEvent};
use crate::types::Usage;

/// Maps run events onto log records and observer spans onto `tracing`
/// spans, recording usage and latency when the span closes.
#[derive(Debug, Clone, Default)]
pub struct TracingObserver {
    service_name: Option<String>,
}

impl TracingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }
}

impl Observer for TracingObserver {
    fn on_event(&self, event: &RunEvent) {
        let service = self.service_name.as_deref().unwrap_or("agent-engine");
        match event {
            RunEvent::GuardrailFailed { .. } | RunEvent::LoopDetected { .. } => {
                tracing::warn!(service, event = event.name(), detail = ?event, "Run event");
            }
            RunEvent::RunFailed { .. } => {
                tracing::error!(service, event = event.name(), detail = ?event, "Run event");
            }
            _ => {
                tracing::info!(service, event = event.name(), detail = ?event, "Run event");
            }
        }
    }

    fn begin(&self, name: &str, metadata: &Value) -> Option<Box<dyn ObserverSpan>> {
        Some(Box::new(EngineSpan::new(name, metadata)))
    }
}

/// Helper for tracking usage and latency within a span.
struct EngineSpan {
    span: Span,
    start: Instant,
}

impl EngineSpan {
    fn new(name: &str, metadata: &Value) -> Self {
        let span = span!(
            Level::INFO,
            "engine.span",
            otel.name = name,
            metadata = %metadata,
            input_tokens = field::Empty,
            output_tokens = field::Empty,
            output_len = field::Empty,
            latency_ms = field::Empty,
        );
        Self {
            span,
            start: Instant::now(),
        }
    }
}

impl ObserverSpan for EngineSpan {
    fn end(self: Box<Self>, output: &Value, usage: Option<&Usage>) {
        if let Some(usage) = usage {
            self.span.record("input_tokens", usage.input_tokens);
            self.span.record("output_tokens", usage.output_tokens);
        }
        let output_len = match output {
            Value::String(s) => s.len(),
            Value::Null => 0,
            other => other.to_string().len(),
        };
        self.span.record("output_len", output_len as u64);
        self.span
            .record("latency_ms", self.start.elapsed().as_millis() as u64);
    }
}
