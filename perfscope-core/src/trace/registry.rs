//! Trace registry

use super::span::{ActiveSpan, new_trace_id};
use super::{SpanRecord, TraceConfig};
use crate::registration::RegistrationId;
use opentelemetry::trace::SpanKind;
use parking_lot::RwLock;
use std::sync::Arc;

/// Receives finished, sampled spans
pub trait SpanExporter: Send + Sync {
    /// Export one span
    fn export_span(&self, span: &SpanRecord);
}

/// Registry of span exporters plus the active trace configuration
#[derive(Default)]
pub struct TraceRegistry {
    exporters: RwLock<Vec<(RegistrationId, Arc<dyn SpanExporter>)>>,
    config: RwLock<TraceConfig>,
}

impl TraceRegistry {
    /// Create a registry with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a span exporter
    pub fn register_exporter(&self, exporter: Arc<dyn SpanExporter>) -> RegistrationId {
        let id = RegistrationId::next();
        self.exporters.write().push((id, exporter));
        id
    }

    /// Unregister a span exporter; returns whether it was registered
    pub fn unregister_exporter(&self, id: RegistrationId) -> bool {
        let mut exporters = self.exporters.write();
        let before = exporters.len();
        exporters.retain(|(existing, _)| *existing != id);
        exporters.len() != before
    }

    /// Number of registered span exporters
    pub fn exporter_count(&self) -> usize {
        self.exporters.read().len()
    }

    /// Replace the trace configuration, returning the previous one
    pub fn apply_config(&self, config: TraceConfig) -> TraceConfig {
        std::mem::replace(&mut *self.config.write(), config)
    }

    /// Current trace configuration
    pub fn config(&self) -> TraceConfig {
        *self.config.read()
    }

    /// Start a root span; the sampling decision is taken now
    pub fn start_span(self: &Arc<Self>, name: impl Into<String>, kind: SpanKind) -> ActiveSpan {
        let trace_id = new_trace_id();
        let sampled = self.config().default_sampler.should_sample(trace_id);

        ActiveSpan::new(Arc::clone(self), trace_id, None, name.into(), kind, sampled)
    }

    /// Hand a finished span to every registered exporter
    pub fn export(&self, span: &SpanRecord) {
        let exporters: Vec<Arc<dyn SpanExporter>> = self
            .exporters
            .read()
            .iter()
            .map(|(_, e)| Arc::clone(e))
            .collect();

        for exporter in exporters {
            exporter.export_span(span);
        }
    }
}
