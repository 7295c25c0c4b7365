//! Span records and in-flight spans

use super::TraceRegistry;
use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use opentelemetry::trace::{SpanId, SpanKind, Status, TraceId};
use std::sync::Arc;

/// A finished span
#[derive(Debug, Clone, PartialEq)]
pub struct SpanRecord {
    /// Trace the span belongs to
    pub trace_id: TraceId,
    /// Span id
    pub span_id: SpanId,
    /// Parent span, `None` for a root span
    pub parent_span_id: Option<SpanId>,
    /// Operation name
    pub name: String,
    /// Span kind
    pub kind: SpanKind,
    /// Start time
    pub start_time: DateTime<Utc>,
    /// End time
    pub end_time: DateTime<Utc>,
    /// Attributes
    pub attributes: Vec<KeyValue>,
    /// Final status
    pub status: Status,
}

impl SpanRecord {
    /// Whether this span has no parent
    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }

    /// Wall time between start and end, zero if the clock went backwards
    pub fn duration(&self) -> std::time::Duration {
        (self.end_time - self.start_time)
            .to_std()
            .unwrap_or_default()
    }
}

pub(crate) fn new_trace_id() -> TraceId {
    loop {
        let id = rand::random::<u128>();
        if id != 0 {
            return TraceId::from_bytes(id.to_be_bytes());
        }
    }
}

pub(crate) fn new_span_id() -> SpanId {
    loop {
        let id = rand::random::<u64>();
        if id != 0 {
            return SpanId::from_bytes(id.to_be_bytes());
        }
    }
}

/// A span that has been started and not yet ended
///
/// Ending (explicitly or on drop) hands the finished record to the trace
/// registry's exporters when the trace is sampled.
///
/// # Examples
///
/// ```
/// use perfscope_core::trace::{TraceConfig, TraceRegistry};
/// use perfscope_core::{KeyValue, SpanKind};
/// use std::sync::Arc;
///
/// let registry = Arc::new(TraceRegistry::new());
/// registry.apply_config(TraceConfig::always_sample());
///
/// let mut span = registry.start_span("load_config", SpanKind::Internal);
/// span.set_attribute(KeyValue::new("path", "/etc/app.toml"));
/// assert!(span.is_sampled());
/// span.end();
/// ```
pub struct ActiveSpan {
    registry: Arc<TraceRegistry>,
    trace_id: TraceId,
    span_id: SpanId,
    parent_span_id: Option<SpanId>,
    name: String,
    kind: SpanKind,
    start_time: DateTime<Utc>,
    attributes: Vec<KeyValue>,
    status: Status,
    sampled: bool,
    ended: bool,
}

impl ActiveSpan {
    pub(crate) fn new(
        registry: Arc<TraceRegistry>,
        trace_id: TraceId,
        parent_span_id: Option<SpanId>,
        name: String,
        kind: SpanKind,
        sampled: bool,
    ) -> Self {
        Self {
            registry,
            trace_id,
            span_id: new_span_id(),
            parent_span_id,
            name,
            kind,
            start_time: Utc::now(),
            attributes: Vec::new(),
            status: Status::Unset,
            sampled,
            ended: false,
        }
    }

    /// Trace id
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// Span id
    pub fn span_id(&self) -> SpanId {
        self.span_id
    }

    /// Whether the span will be exported
    pub fn is_sampled(&self) -> bool {
        self.sampled
    }

    /// Add an attribute
    pub fn set_attribute(&mut self, attribute: KeyValue) {
        self.attributes.push(attribute);
    }

    /// Set the final status
    pub fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    /// Start a child span in the same trace
    pub fn child(&self, name: impl Into<String>, kind: SpanKind) -> ActiveSpan {
        ActiveSpan::new(
            Arc::clone(&self.registry),
            self.trace_id,
            Some(self.span_id),
            name.into(),
            kind,
            self.sampled,
        )
    }

    /// End the span
    pub fn end(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;

        if !self.sampled {
            return;
        }

        let record = SpanRecord {
            trace_id: self.trace_id,
            span_id: self.span_id,
            parent_span_id: self.parent_span_id,
            name: std::mem::take(&mut self.name),
            kind: self.kind.clone(),
            start_time: self.start_time,
            end_time: Utc::now(),
            attributes: std::mem::take(&mut self.attributes),
            status: std::mem::replace(&mut self.status, Status::Unset),
        };

        self.registry.export(&record);
    }
}

impl Drop for ActiveSpan {
    fn drop(&mut self) {
        self.finish();
    }
}
