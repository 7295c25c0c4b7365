//! GCE metadata server lookups.

use crate::error::{Result, StackdriverError};
use async_trait::async_trait;
use std::time::Duration;

/// Base URL of the metadata server.
pub const METADATA_BASE_URL: &str = "http://metadata.google.internal/computeMetadata/v1";

const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

/// Source of instance metadata.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Zone the instance runs in, e.g. `us-central1-a`.
    async fn zone(&self) -> Result<String>;

    /// Numeric instance ID.
    async fn instance_id(&self) -> Result<String>;

    /// Project ID.
    async fn project_id(&self) -> Result<String>;
}

/// Metadata server client.
#[derive(Debug, Clone)]
pub struct GceMetadataClient {
    client: reqwest::Client,
    base_url: String,
}

impl GceMetadataClient {
    /// Client for the real metadata server.
    pub fn new() -> Result<Self> {
        Self::with_base_url(METADATA_BASE_URL)
    }

    /// Client for a metadata server at another address.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(METADATA_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get(&self, path: &str) -> Result<String> {
        let url = format!("{}/{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| StackdriverError::Metadata(format!("{}: {}", path, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StackdriverError::Metadata(format!(
                "{}: unexpected status {}",
                path, status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| StackdriverError::Metadata(format!("{}: {}", path, e)))?;

        let value = body.trim();
        if value.is_empty() {
            return Err(StackdriverError::Metadata(format!("{}: empty response", path)));
        }

        tracing::debug!(path, value, "metadata lookup");
        Ok(value.to_string())
    }
}

#[async_trait]
impl MetadataProvider for GceMetadataClient {
    async fn zone(&self) -> Result<String> {
        // Returned as projects/<number>/zones/<zone>
        let zone = self.get("instance/zone").await?;
        Ok(last_segment(&zone).to_string())
    }

    async fn instance_id(&self) -> Result<String> {
        self.get("instance/id").await
    }

    async fn project_id(&self) -> Result<String> {
        self.get("project/project-id").await
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
