//! Exporter lifecycle contract

use crate::error::{TelemetryError, TelemetryResult};
use crate::registration::RegistrationId;
use crate::stats::ViewExporter;
use crate::telemetry::Telemetry;
use crate::trace::{SpanExporter, TraceConfig};
use async_trait::async_trait;
use std::sync::Arc;

/// Lifecycle state of an exporter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Constructed, not started
    Created,
    /// Exporting
    Started,
    /// Stopped; terminal
    Stopped,
}

impl LifecycleState {
    /// Error unless the exporter can be started from this state
    pub fn ensure_can_start(self) -> TelemetryResult<()> {
        match self {
            LifecycleState::Created => Ok(()),
            state => Err(TelemetryError::InvalidState {
                operation: "start",
                state,
            }),
        }
    }
}

/// Trace and metric exporter with a start/stop lifecycle
///
/// A host calls [`start`](Exporter::start) once at boot and
/// [`stop`](Exporter::stop) once at shutdown.
#[async_trait]
pub trait Exporter: Send + Sync {
    /// Register views and begin exporting
    async fn start(&mut self) -> TelemetryResult<()>;

    /// Stop exporting and flush whatever is buffered
    async fn stop(&mut self);

    /// Current lifecycle state
    fn state(&self) -> LifecycleState;

    /// Exporter name (for logging)
    fn name(&self) -> &'static str {
        "Exporter"
    }
}

/// Everything an exporter registered while starting
///
/// [`release`](RegistrationSet::release) undoes exactly those registrations
/// and restores the trace configuration that was active before.
#[derive(Default)]
pub struct RegistrationSet {
    views: Vec<String>,
    view_exporter: Option<RegistrationId>,
    span_exporter: Option<RegistrationId>,
    previous_trace_config: Option<TraceConfig>,
}

impl RegistrationSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember views this exporter newly registered
    pub fn add_views(&mut self, names: Vec<String>) {
        self.views.extend(names);
    }

    /// Register a view exporter and remember it
    pub fn register_view_exporter(
        &mut self,
        telemetry: &Telemetry,
        exporter: Arc<dyn ViewExporter>,
    ) {
        if let Some(previous) = self.view_exporter.take() {
            telemetry.stats().unregister_exporter(previous);
        }
        self.view_exporter = Some(telemetry.stats().register_exporter(exporter));
    }

    /// Register a span exporter and remember it
    pub fn register_span_exporter(
        &mut self,
        telemetry: &Telemetry,
        exporter: Arc<dyn SpanExporter>,
    ) {
        if let Some(previous) = self.span_exporter.take() {
            telemetry.trace().unregister_exporter(previous);
        }
        self.span_exporter = Some(telemetry.trace().register_exporter(exporter));
    }

    /// Apply a trace configuration, keeping the first replaced one
    pub fn apply_trace_config(&mut self, telemetry: &Telemetry, config: TraceConfig) {
        let previous = telemetry.trace().apply_config(config);
        self.previous_trace_config.get_or_insert(previous);
    }

    /// Unregister the span exporter only
    pub fn release_span_exporter(&mut self, telemetry: &Telemetry) {
        if let Some(id) = self.span_exporter.take() {
            telemetry.trace().unregister_exporter(id);
        }
    }

    /// Undo every remembered registration
    pub fn release(&mut self, telemetry: &Telemetry) {
        if let Some(id) = self.view_exporter.take() {
            telemetry.stats().unregister_exporter(id);
        }

        self.release_span_exporter(telemetry);

        if let Some(config) = self.previous_trace_config.take() {
            telemetry.trace().apply_config(config);
        }

        if !self.views.is_empty() {
            telemetry.stats().unregister_views(&self.views);
            self.views.clear();
        }
    }
}
