//! Cloud exporter configuration.

use crate::error::{Result, StackdriverError};
use crate::metadata::MetadataProvider;
use crate::resource::{self, MonitoredResource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Project override.
pub const ENV_PROJECT_ID: &str = "STACKDRIVER_PROJECT_ID";
/// Cloud Run service name; marks a managed serverless host.
pub const ENV_SERVICE: &str = "K_SERVICE";
/// Cloud Run revision.
pub const ENV_REVISION: &str = "K_REVISION";
/// Zone override for local testing.
pub const ENV_ZONE: &str = "GCP_COMPUTE_ZONE";
/// Instance ID override for local testing.
pub const ENV_INSTANCE_ID: &str = "GCP_INSTANCE_ID";

/// Default metric reporting interval.
pub const DEFAULT_REPORTING_INTERVAL: Duration = Duration::from_secs(60);
/// Default interval at which buffered spans are uploaded.
pub const DEFAULT_TRACE_FLUSH_INTERVAL: Duration = Duration::from_secs(2);
/// Default metric prefix.
pub const DEFAULT_METRIC_PREFIX: &str = "perfscope.dev/opencensus";
/// Cloud Monitoring API endpoint.
pub const DEFAULT_MONITORING_ENDPOINT: &str = "https://monitoring.googleapis.com";
/// Cloud Trace API endpoint.
pub const DEFAULT_TRACE_ENDPOINT: &str = "https://cloudtrace.googleapis.com";
/// Request timeout for API calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Values read from the process environment.
///
/// Empty variables count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudEnvironment {
    /// `STACKDRIVER_PROJECT_ID`
    pub project_id: Option<String>,
    /// `K_SERVICE`
    pub service: Option<String>,
    /// `K_REVISION`
    pub revision: Option<String>,
    /// `GCP_COMPUTE_ZONE`
    pub zone: Option<String>,
    /// `GCP_INSTANCE_ID`
    pub instance_id: Option<String>,
}

impl CloudEnvironment {
    /// Read the environment of this process.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        Self {
            project_id: get(ENV_PROJECT_ID),
            service: get(ENV_SERVICE),
            revision: get(ENV_REVISION),
            zone: get(ENV_ZONE),
            instance_id: get(ENV_INSTANCE_ID),
        }
    }

    /// Whether `K_SERVICE` is set.
    pub fn is_managed_serverless(&self) -> bool {
        self.service.is_some()
    }
}

/// Callback for failures that happen in the background.
#[derive(Clone)]
pub struct ErrorHandler(Arc<dyn Fn(&StackdriverError) + Send + Sync>);

impl ErrorHandler {
    /// Wrap a callback.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&StackdriverError) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Report an error.
    pub fn handle(&self, error: &StackdriverError) {
        (self.0)(error)
    }
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::new(|error| tracing::error!(error = %error, "opencensus stackdriver error"))
    }
}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorHandler")
    }
}

/// Cloud exporter options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudExporterOptions {
    /// GCP project ID; detected from credentials when unset.
    pub project_id: Option<String>,
    /// Interval between metric uploads.
    #[serde(default = "default_reporting_interval")]
    pub reporting_interval: Duration,
    /// Interval between span uploads.
    #[serde(default = "default_trace_flush_interval")]
    pub trace_flush_interval: Duration,
    /// Prefix of every metric type.
    #[serde(default = "default_metric_prefix")]
    pub metric_prefix: String,
    /// Resource attached to every time series; `global` when unset.
    pub monitored_resource: Option<MonitoredResource>,
    /// Labels attached to every time series.
    ///
    /// `None` attaches the `opencensus_task` label identifying this process.
    pub default_labels: Option<BTreeMap<String, String>>,
    /// Cloud Monitoring API endpoint.
    #[serde(default = "default_monitoring_endpoint")]
    pub monitoring_endpoint: String,
    /// Cloud Trace API endpoint.
    #[serde(default = "default_trace_endpoint")]
    pub trace_endpoint: String,
    /// Request timeout.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
    /// Background failure callback.
    #[serde(skip)]
    pub on_error: ErrorHandler,
}

fn default_reporting_interval() -> Duration {
    DEFAULT_REPORTING_INTERVAL
}

fn default_trace_flush_interval() -> Duration {
    DEFAULT_TRACE_FLUSH_INTERVAL
}

fn default_metric_prefix() -> String {
    DEFAULT_METRIC_PREFIX.to_string()
}

fn default_monitoring_endpoint() -> String {
    DEFAULT_MONITORING_ENDPOINT.to_string()
}

fn default_trace_endpoint() -> String {
    DEFAULT_TRACE_ENDPOINT.to_string()
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

impl Default for CloudExporterOptions {
    fn default() -> Self {
        Self {
            project_id: None,
            reporting_interval: DEFAULT_REPORTING_INTERVAL,
            trace_flush_interval: DEFAULT_TRACE_FLUSH_INTERVAL,
            metric_prefix: default_metric_prefix(),
            monitored_resource: None,
            default_labels: None,
            monitoring_endpoint: default_monitoring_endpoint(),
            trace_endpoint: default_trace_endpoint(),
            timeout: DEFAULT_TIMEOUT,
            on_error: ErrorHandler::default(),
        }
    }
}

impl CloudExporterOptions {
    /// Create a builder.
    pub fn builder() -> CloudExporterOptionsBuilder {
        CloudExporterOptionsBuilder::new()
    }

    /// Options for the given environment.
    ///
    /// On Cloud Run this attaches a `gae_instance` resource and clears the
    /// default labels; metadata lookups only happen for values the
    /// environment does not override.
    pub async fn for_environment(
        env: &CloudEnvironment,
        metadata: &dyn MetadataProvider,
    ) -> Result<Self> {
        let mut builder = Self::builder();

        if let Some(project) = &env.project_id {
            builder = builder.project_id(project.clone());
        }

        if let Some(resource) = resource::detect_resource(env, metadata).await? {
            builder = builder
                .monitored_resource(resource)
                .default_labels(BTreeMap::new());
        }

        builder.build()
    }

    /// Set the project found after the resource was derived
    ///
    /// A resource built without a project gets its `project_id` label filled
    /// in as well.
    pub fn set_project_id(&mut self, project_id: impl Into<String>) {
        let project_id = project_id.into();

        if let Some(label) = self
            .monitored_resource
            .as_mut()
            .and_then(|resource| resource.labels.get_mut("project_id"))
            .filter(|label| label.is_empty())
        {
            *label = project_id.clone();
        }

        self.project_id = Some(project_id);
    }

    /// Check the options for values the exporter cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.reporting_interval.is_zero() {
            return Err(StackdriverError::Config(
                "reporting interval must be positive".to_string(),
            ));
        }
        if self.trace_flush_interval.is_zero() {
            return Err(StackdriverError::Config(
                "trace flush interval must be positive".to_string(),
            ));
        }
        if self.metric_prefix.is_empty() {
            return Err(StackdriverError::Config("metric prefix is empty".to_string()));
        }
        Ok(())
    }
}

/// Builder for cloud exporter options.
#[derive(Debug, Default)]
pub struct CloudExporterOptionsBuilder {
    options: CloudExporterOptions,
}

impl CloudExporterOptionsBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the project ID.
    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.options.project_id = Some(project_id.into());
        self
    }

    /// Set the metric reporting interval.
    pub fn reporting_interval(mut self, interval: Duration) -> Self {
        self.options.reporting_interval = interval;
        self
    }

    /// Set the span upload interval.
    pub fn trace_flush_interval(mut self, interval: Duration) -> Self {
        self.options.trace_flush_interval = interval;
        self
    }

    /// Set the metric prefix.
    pub fn metric_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options.metric_prefix = prefix.into();
        self
    }

    /// Set the monitored resource.
    pub fn monitored_resource(mut self, resource: MonitoredResource) -> Self {
        self.options.monitored_resource = Some(resource);
        self
    }

    /// Set the default labels.
    pub fn default_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.options.default_labels = Some(labels);
        self
    }

    /// Set the Cloud Monitoring endpoint.
    pub fn monitoring_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.options.monitoring_endpoint = endpoint.into();
        self
    }

    /// Set the Cloud Trace endpoint.
    pub fn trace_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.options.trace_endpoint = endpoint.into();
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    /// Set the background failure callback.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&StackdriverError) + Send + Sync + 'static,
    {
        self.options.on_error = ErrorHandler::new(f);
        self
    }

    /// Build the options.
    pub fn build(self) -> Result<CloudExporterOptions> {
        self.options.validate()?;
        Ok(self.options)
    }
}
