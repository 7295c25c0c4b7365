//! Registry handle passed to exporters

use crate::stats::{Measurement, StatsRegistry, TagMap};
use crate::trace::{ActiveSpan, TraceRegistry};
use once_cell::sync::Lazy;
use opentelemetry::trace::SpanKind;
use std::sync::Arc;

/// Process-wide default registries
static GLOBAL: Lazy<Telemetry> = Lazy::new(Telemetry::new);

/// The view and trace registries an exporter works against
///
/// Cloning is cheap and yields a handle to the same registries.
///
/// # Examples
///
/// ```
/// use perfscope_core::Telemetry;
///
/// let isolated = Telemetry::new();
/// assert!(isolated.stats().view_names().is_empty());
///
/// let global = Telemetry::global();
/// assert!(global.same_registries(&Telemetry::global()));
/// assert!(!global.same_registries(&isolated));
/// ```
#[derive(Clone, Default)]
pub struct Telemetry {
    stats: Arc<StatsRegistry>,
    trace: Arc<TraceRegistry>,
}

impl Telemetry {
    /// Create a handle to fresh, isolated registries
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the process-wide registries
    pub fn global() -> Self {
        GLOBAL.clone()
    }

    /// View registry
    pub fn stats(&self) -> &Arc<StatsRegistry> {
        &self.stats
    }

    /// Trace registry
    pub fn trace(&self) -> &Arc<TraceRegistry> {
        &self.trace
    }

    /// Record measurements into the view registry
    pub fn record(&self, tags: &TagMap, measurements: &[Measurement]) {
        self.stats.record(tags, measurements);
    }

    /// Start a root span in the trace registry
    pub fn start_span(&self, name: impl Into<String>, kind: SpanKind) -> ActiveSpan {
        self.trace.start_span(name, kind)
    }

    /// Whether both handles point at the same registries
    pub fn same_registries(&self, other: &Telemetry) -> bool {
        Arc::ptr_eq(&self.stats, &other.stats) && Arc::ptr_eq(&self.trace, &other.trace)
    }
}
