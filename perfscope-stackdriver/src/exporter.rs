//! Cloud Monitoring / Cloud Trace exporter.

use crate::client::{HttpMonitoringClient, MonitoringClient};
use crate::config::{CloudEnvironment, CloudExporterOptions, ErrorHandler};
use crate::convert::{self, SeriesContext, TASK_LABEL};
use crate::error::{Result, StackdriverError};
use crate::metadata::{GceMetadataClient, MetadataProvider};
use crate::resource::MonitoredResource;
use async_trait::async_trait;
use parking_lot::Mutex;
use perfscope_core::stats::PeriodicReporter;
use perfscope_core::trace::{SpanExporter, SpanRecord, TraceConfig};
use perfscope_core::{Exporter, LifecycleState, RegistrationSet, Telemetry, TelemetryResult};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Spans held between uploads before new ones are dropped.
pub const MAX_BUFFERED_SPANS: usize = 8192;

/// Collects finished spans until the next upload.
#[derive(Default)]
pub(crate) struct SpanBuffer {
    spans: Mutex<Vec<SpanRecord>>,
}

impl SpanBuffer {
    fn drain(&self) -> Vec<SpanRecord> {
        std::mem::take(&mut *self.spans.lock())
    }

    fn len(&self) -> usize {
        self.spans.lock().len()
    }
}

impl SpanExporter for SpanBuffer {
    fn export_span(&self, span: &SpanRecord) {
        let mut spans = self.spans.lock();
        if spans.len() >= MAX_BUFFERED_SPANS {
            tracing::warn!(span = %span.name, "span buffer full, dropping span");
            return;
        }
        spans.push(span.clone());
    }
}

/// Shared by the exporter and its background tasks.
struct Uploader {
    telemetry: Telemetry,
    client: Arc<dyn MonitoringClient>,
    project_id: String,
    series: SeriesContext,
    spans: Arc<SpanBuffer>,
    on_error: ErrorHandler,
}

impl Uploader {
    async fn upload_metrics(&self) {
        let series: Vec<_> = self
            .telemetry
            .stats()
            .collect()
            .iter()
            .flat_map(|data| convert::view_to_time_series(data, &self.series))
            .collect();

        if series.is_empty() {
            return;
        }

        let count = series.len();
        match self.client.create_time_series(&self.project_id, series).await {
            Ok(()) => tracing::debug!(count, "metrics exported"),
            Err(e) => self.on_error.handle(&e),
        }
    }

    async fn flush_spans(&self) {
        let spans: Vec<_> = self
            .spans
            .drain()
            .iter()
            .map(|span| convert::span_to_trace_span(&self.project_id, span))
            .collect();

        if spans.is_empty() {
            return;
        }

        let count = spans.len();
        match self.client.batch_write_spans(&self.project_id, spans).await {
            Ok(()) => tracing::debug!(count, "spans exported"),
            Err(e) => self.on_error.handle(&e),
        }
    }
}

/// Exports view data to Cloud Monitoring and spans to Cloud Trace
///
/// Metrics are read straight from the view registry every
/// `reporting_interval`. Spans are buffered and uploaded every
/// `trace_flush_interval`. Stopping uploads whatever is left and closes the
/// client.
pub struct CloudExporter {
    uploader: Arc<Uploader>,
    options: CloudExporterOptions,
    state: LifecycleState,
    registrations: RegistrationSet,
    metrics_reporter: Option<PeriodicReporter>,
    trace_reporter: Option<PeriodicReporter>,
}

impl CloudExporter {
    /// Create an exporter over an existing client
    ///
    /// The project must be set in the options.
    pub fn new(
        telemetry: Telemetry,
        options: CloudExporterOptions,
        client: Arc<dyn MonitoringClient>,
    ) -> Result<Self> {
        options.validate()?;
        let project_id = options
            .project_id
            .clone()
            .ok_or(StackdriverError::ProjectNotSpecified)?;

        let resource = options
            .monitored_resource
            .clone()
            .unwrap_or_else(|| MonitoredResource::global(project_id.clone()));

        let default_labels = options.default_labels.clone().unwrap_or_else(|| {
            BTreeMap::from([(TASK_LABEL.to_string(), convert::task_label_value())])
        });

        let uploader = Uploader {
            telemetry,
            client,
            project_id,
            series: SeriesContext {
                metric_prefix: options.metric_prefix.clone(),
                resource,
                default_labels,
            },
            spans: Arc::new(SpanBuffer::default()),
            on_error: options.on_error.clone(),
        };

        Ok(Self {
            uploader: Arc::new(uploader),
            options,
            state: LifecycleState::Created,
            registrations: RegistrationSet::new(),
            metrics_reporter: None,
            trace_reporter: None,
        })
    }

    /// Create an exporter from the process environment
    pub async fn from_env(telemetry: Telemetry) -> Result<Self> {
        let env = CloudEnvironment::from_env();
        let metadata = GceMetadataClient::new()?;
        Self::from_environment(telemetry, &env, &metadata).await
    }

    /// Create an exporter for a given environment
    ///
    /// Resolves the monitored resource, builds an authenticated HTTP client
    /// and, when the environment names no project, asks the credentials and
    /// then the metadata server for one.
    pub async fn from_environment(
        telemetry: Telemetry,
        env: &CloudEnvironment,
        metadata: &dyn MetadataProvider,
    ) -> Result<Self> {
        let mut options = CloudExporterOptions::for_environment(env, metadata).await?;
        let client = HttpMonitoringClient::new(&options).await?;

        if options.project_id.is_none() {
            let project = match client.detect_project_id().await {
                Ok(project) => project,
                Err(e) => {
                    tracing::debug!(error = %e, "no project from credentials, asking metadata server");
                    metadata.project_id().await?
                }
            };
            options.set_project_id(project);
        }

        Self::new(telemetry, options, Arc::new(client))
    }

    /// Project metrics and spans are written to
    pub fn project_id(&self) -> &str {
        &self.uploader.project_id
    }

    /// Resource attached to every time series
    pub fn monitored_resource(&self) -> &MonitoredResource {
        &self.uploader.series.resource
    }

    pub fn options(&self) -> &CloudExporterOptions {
        &self.options
    }

    /// Spans waiting for the next upload
    pub fn buffered_spans(&self) -> usize {
        self.uploader.spans.len()
    }

    /// Upload metrics and buffered spans now
    pub async fn flush(&self) {
        self.uploader.upload_metrics().await;
        self.uploader.flush_spans().await;
    }
}

#[async_trait]
impl Exporter for CloudExporter {
    async fn start(&mut self) -> TelemetryResult<()> {
        self.state.ensure_can_start()?;

        let telemetry = self.uploader.telemetry.clone();
        let added = perfscope_views::register_application_views(telemetry.stats())?;
        self.registrations.add_views(added);

        let uploader = Arc::clone(&self.uploader);
        self.metrics_reporter = Some(PeriodicReporter::spawn(
            "stackdriver-metrics",
            self.options.reporting_interval,
            move || {
                let uploader = Arc::clone(&uploader);
                async move { uploader.upload_metrics().await }
            },
        ));

        let uploader = Arc::clone(&self.uploader);
        self.trace_reporter = Some(PeriodicReporter::spawn(
            "stackdriver-traces",
            self.options.trace_flush_interval,
            move || {
                let uploader = Arc::clone(&uploader);
                async move { uploader.flush_spans().await }
            },
        ));

        self.registrations
            .register_span_exporter(&telemetry, self.uploader.spans.clone());
        self.registrations
            .apply_trace_config(&telemetry, TraceConfig::always_sample());

        self.state = LifecycleState::Started;
        tracing::info!(
            project_id = %self.uploader.project_id,
            resource_type = %self.uploader.series.resource.resource_type,
            reporting_interval_secs = self.options.reporting_interval.as_secs(),
            "stackdriver exporter started"
        );
        Ok(())
    }

    async fn stop(&mut self) {
        if self.state != LifecycleState::Started {
            tracing::warn!(state = ?self.state, "stackdriver exporter is not running, ignoring stop");
            return;
        }

        if let Some(reporter) = self.metrics_reporter.take() {
            reporter.stop().await;
        }
        if let Some(reporter) = self.trace_reporter.take() {
            reporter.stop().await;
        }

        let telemetry = self.uploader.telemetry.clone();
        self.registrations.release_span_exporter(&telemetry);

        self.flush().await;

        if let Err(e) = self.uploader.client.close().await {
            tracing::error!(error = %e, "failed to close stackdriver exporter");
        }

        self.registrations.release(&telemetry);
        self.state = LifecycleState::Stopped;
        tracing::info!("stackdriver exporter stopped");
    }

    fn state(&self) -> LifecycleState {
        self.state
    }

    fn name(&self) -> &'static str {
        "CloudExporter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{TimeSeries, TraceSpan};
    use perfscope_core::SpanKind;

    #[derive(Default)]
    struct RecordingClient {
        series: Mutex<Vec<TimeSeries>>,
        spans: Mutex<Vec<TraceSpan>>,
    }

    #[async_trait]
    impl MonitoringClient for RecordingClient {
        async fn create_time_series(&self, _project_id: &str, series: Vec<TimeSeries>) -> Result<()> {
            self.series.lock().extend(series);
            Ok(())
        }

        async fn batch_write_spans(&self, _project_id: &str, spans: Vec<TraceSpan>) -> Result<()> {
            self.spans.lock().extend(spans);
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn options() -> CloudExporterOptions {
        CloudExporterOptions::builder().project_id("proj").build().unwrap()
    }

    #[test]
    fn test_new_requires_project() {
        let result = CloudExporter::new(
            Telemetry::new(),
            CloudExporterOptions::default(),
            Arc::new(RecordingClient::default()),
        );
        assert!(matches!(result, Err(StackdriverError::ProjectNotSpecified)));
    }

    #[test]
    fn test_defaults_to_global_resource_with_task_label() {
        let exporter =
            CloudExporter::new(Telemetry::new(), options(), Arc::new(RecordingClient::default()))
                .unwrap();

        assert_eq!(exporter.monitored_resource(), &MonitoredResource::global("proj"));
        let labels = &exporter.uploader.series.default_labels;
        assert!(labels[TASK_LABEL].starts_with("rust-"));
    }

    #[test]
    fn test_span_buffer_is_bounded() {
        let buffer = SpanBuffer::default();
        let telemetry = Telemetry::new();
        telemetry.trace().apply_config(TraceConfig::always_sample());
        let capture = Arc::new(SpanBuffer::default());
        telemetry.trace().register_exporter(capture.clone());
        telemetry.start_span("op", SpanKind::Internal).end();
        let span = capture.drain().remove(0);

        for _ in 0..MAX_BUFFERED_SPANS + 5 {
            buffer.export_span(&span);
        }
        assert_eq!(buffer.len(), MAX_BUFFERED_SPANS);
        assert_eq!(buffer.drain().len(), MAX_BUFFERED_SPANS);
        assert_eq!(buffer.len(), 0);
    }

    #[tokio::test]
    async fn test_flush_uploads_metrics_and_spans() {
        let telemetry = Telemetry::new();
        let client = Arc::new(RecordingClient::default());
        let mut exporter = CloudExporter::new(telemetry.clone(), options(), client.clone()).unwrap();
        exporter.start().await.unwrap();

        perfscope_views::HttpMetrics::new(telemetry.clone())
            .record_request("GET", "/", 200, 5.0, 0, 10);
        telemetry.start_span("request", SpanKind::Server).end();
        assert_eq!(exporter.buffered_spans(), 1);

        exporter.flush().await;
        assert!(!client.series.lock().is_empty());
        assert_eq!(client.spans.lock().len(), 1);
        assert_eq!(exporter.buffered_spans(), 0);

        exporter.stop().await;
    }
}
