//! Cloud Monitoring and Cloud Trace API client.

use crate::config::CloudExporterOptions;
use crate::convert::{BatchWriteSpansRequest, CreateTimeSeriesRequest, TimeSeries, TraceSpan};
use crate::error::{Result, StackdriverError};
use async_trait::async_trait;
use gcp_auth::TokenProvider;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cloud Monitoring accepts at most this many series per request.
pub const MAX_TIME_SERIES_PER_REQUEST: usize = 200;

/// OAuth scope for writing metrics.
pub const MONITORING_WRITE_SCOPE: &str = "https://www.googleapis.com/auth/monitoring.write";
/// OAuth scope for writing spans.
pub const TRACE_APPEND_SCOPE: &str = "https://www.googleapis.com/auth/trace.append";

const SCOPES: &[&str] = &[MONITORING_WRITE_SCOPE, TRACE_APPEND_SCOPE];

/// Backend the cloud exporter uploads to.
#[async_trait]
pub trait MonitoringClient: Send + Sync {
    /// Write time series to a project.
    async fn create_time_series(&self, project_id: &str, series: Vec<TimeSeries>) -> Result<()>;

    /// Write spans to a project.
    async fn batch_write_spans(&self, project_id: &str, spans: Vec<TraceSpan>) -> Result<()>;

    /// Release the client; later calls fail.
    async fn close(&self) -> Result<()>;
}

/// REST client authenticated through `gcp_auth`.
pub struct HttpMonitoringClient {
    http: reqwest::Client,
    auth: Option<Arc<dyn TokenProvider>>,
    monitoring_endpoint: String,
    trace_endpoint: String,
    closed: AtomicBool,
}

impl HttpMonitoringClient {
    /// Client using Application Default Credentials.
    pub async fn new(options: &CloudExporterOptions) -> Result<Self> {
        let provider = gcp_auth::provider().await?;
        Self::with_token_provider(options, Some(provider))
    }

    /// Client with an explicit token provider; `None` sends no credentials.
    pub fn with_token_provider(
        options: &CloudExporterOptions,
        auth: Option<Arc<dyn TokenProvider>>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(options.timeout).build()?;

        Ok(Self {
            http,
            auth,
            monitoring_endpoint: options.monitoring_endpoint.trim_end_matches('/').to_string(),
            trace_endpoint: options.trace_endpoint.trim_end_matches('/').to_string(),
            closed: AtomicBool::new(false),
        })
    }

    /// Project the credentials belong to.
    pub async fn detect_project_id(&self) -> Result<String> {
        let auth = self.auth.as_ref().ok_or(StackdriverError::ProjectNotSpecified)?;
        let project = auth.project_id().await?;
        Ok(project.to_string())
    }

    async fn post<T: Serialize + Sync>(&self, url: &str, body: &T) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StackdriverError::Closed);
        }

        let mut request = self.http.post(url).json(body);
        if let Some(auth) = &self.auth {
            let token = auth.token(SCOPES).await?;
            request = request.bearer_auth(token.as_str());
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StackdriverError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl MonitoringClient for HttpMonitoringClient {
    async fn create_time_series(&self, project_id: &str, series: Vec<TimeSeries>) -> Result<()> {
        let url = format!(
            "{}/v3/projects/{}/timeSeries",
            self.monitoring_endpoint, project_id
        );

        for chunk in series.chunks(MAX_TIME_SERIES_PER_REQUEST) {
            let body = CreateTimeSeriesRequest {
                time_series: chunk.to_vec(),
            };
            self.post(&url, &body).await?;
            tracing::debug!(project_id, count = chunk.len(), "time series uploaded");
        }

        Ok(())
    }

    async fn batch_write_spans(&self, project_id: &str, spans: Vec<TraceSpan>) -> Result<()> {
        if spans.is_empty() {
            return Ok(());
        }

        let url = format!(
            "{}/v2/projects/{}/traces:batchWrite",
            self.trace_endpoint, project_id
        );
        let count = spans.len();
        self.post(&url, &BatchWriteSpansRequest { spans }).await?;
        tracing::debug!(project_id, count, "spans uploaded");

        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(StackdriverError::Closed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> HttpMonitoringClient {
        let options = CloudExporterOptions::builder()
            .monitoring_endpoint("http://127.0.0.1:1/")
            .trace_endpoint("http://127.0.0.1:1")
            .build()
            .unwrap();
        HttpMonitoringClient::with_token_provider(&options, None).unwrap()
    }

    #[test]
    fn test_endpoints_trimmed() {
        let client = client();
        assert_eq!(client.monitoring_endpoint, "http://127.0.0.1:1");
        assert_eq!(client.trace_endpoint, "http://127.0.0.1:1");
    }

    #[tokio::test]
    async fn test_closed_client_rejects_calls() {
        let client = client();
        client.close().await.unwrap();

        assert!(matches!(client.close().await, Err(StackdriverError::Closed)));
        let result = client
            .post("http://127.0.0.1:1/x", &serde_json::json!({}))
            .await;
        assert!(matches!(result, Err(StackdriverError::Closed)));
    }

    #[tokio::test]
    async fn test_project_detection_needs_credentials() {
        assert!(matches!(
            client().detect_project_id().await,
            Err(StackdriverError::ProjectNotSpecified)
        ));
    }
}
