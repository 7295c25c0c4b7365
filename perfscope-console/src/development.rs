//! Development exporter

use crate::print::PrintExporter;
use crate::span::NiceLoggingSpanExporter;
use async_trait::async_trait;
use perfscope_core::stats::{PeriodicReporter, ViewExporter};
use perfscope_core::trace::TraceConfig;
use perfscope_core::{Exporter, LifecycleState, RegistrationSet, Telemetry, TelemetryResult};
use std::sync::Arc;

/// Prints view data and span trees to the log
///
/// Registers the application views, a [`PrintExporter`] and a
/// [`NiceLoggingSpanExporter`], samples every trace, and feeds the view
/// exporter at the registry's reporting period. Makes no network calls.
///
/// # Examples
///
/// ```
/// use perfscope_console::DevelopmentExporter;
/// use perfscope_core::{Exporter, LifecycleState, Telemetry};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let telemetry = Telemetry::new();
/// let mut exporter = DevelopmentExporter::new(telemetry.clone());
///
/// exporter.start().await.unwrap();
/// assert_eq!(exporter.state(), LifecycleState::Started);
///
/// exporter.stop().await;
/// assert!(telemetry.stats().view_names().is_empty());
/// # }
/// ```
pub struct DevelopmentExporter {
    telemetry: Telemetry,
    state: LifecycleState,
    registrations: RegistrationSet,
    reporter: Option<PeriodicReporter>,
    print: Arc<PrintExporter>,
    spans: Arc<NiceLoggingSpanExporter>,
}

impl DevelopmentExporter {
    /// Create an exporter bound to the given registries
    pub fn new(telemetry: Telemetry) -> Self {
        Self {
            telemetry,
            state: LifecycleState::Created,
            registrations: RegistrationSet::new(),
            reporter: None,
            print: Arc::new(PrintExporter::new()),
            spans: Arc::new(NiceLoggingSpanExporter::new()),
        }
    }

    /// Registries this exporter works against
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }
}

#[async_trait]
impl Exporter for DevelopmentExporter {
    async fn start(&mut self) -> TelemetryResult<()> {
        self.state.ensure_can_start()?;

        let added = perfscope_views::register_application_views(self.telemetry.stats())?;
        self.registrations.add_views(added);

        self.registrations
            .register_view_exporter(&self.telemetry, self.print.clone());
        self.registrations
            .register_span_exporter(&self.telemetry, self.spans.clone());
        self.registrations
            .apply_trace_config(&self.telemetry, TraceConfig::always_sample());

        let stats = Arc::clone(self.telemetry.stats());
        let period = stats.reporting_period();
        self.reporter = Some(PeriodicReporter::spawn("development", period, move || {
            let stats = Arc::clone(&stats);
            async move { stats.report() }
        }));

        self.state = LifecycleState::Started;
        tracing::info!(
            reporting_period_ms = period.as_millis() as u64,
            "development exporter started"
        );
        Ok(())
    }

    async fn stop(&mut self) {
        if self.state != LifecycleState::Started {
            tracing::warn!(state = ?self.state, "development exporter is not running, ignoring stop");
            return;
        }

        if let Some(reporter) = self.reporter.take() {
            reporter.stop().await;
        }

        // Last snapshot, for this exporter only
        for data in self.telemetry.stats().collect() {
            self.print.export_view(&data);
        }
        self.spans.flush();

        self.registrations.release(&self.telemetry);
        self.state = LifecycleState::Stopped;
        tracing::info!("development exporter stopped");
    }

    fn state(&self) -> LifecycleState {
        self.state
    }

    fn name(&self) -> &'static str {
        "DevelopmentExporter"
    }
}
