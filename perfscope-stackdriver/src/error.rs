//! Cloud exporter error types.

use perfscope_core::TelemetryError;
use thiserror::Error;

/// Result type for cloud exporter operations.
pub type Result<T> = std::result::Result<T, StackdriverError>;

/// Cloud exporter errors.
#[derive(Debug, Error)]
pub enum StackdriverError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// GCP project ID could not be determined.
    #[error("GCP project ID not specified and could not be detected")]
    ProjectNotSpecified,

    /// Metadata server lookup failed.
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// Authentication error.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// API rejected the request.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body.
        message: String,
    },

    /// Client was already closed.
    #[error("Client is closed")]
    Closed,

    /// Underlying HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<gcp_auth::Error> for StackdriverError {
    fn from(e: gcp_auth::Error) -> Self {
        Self::Auth(e.to_string())
    }
}

impl From<StackdriverError> for TelemetryError {
    fn from(e: StackdriverError) -> Self {
        match e {
            StackdriverError::Config(msg) => TelemetryError::Config(msg),
            StackdriverError::ProjectNotSpecified
            | StackdriverError::Metadata(_)
            | StackdriverError::Auth(_) => TelemetryError::Initialization(e.to_string()),
            other => TelemetryError::Exporter(other.to_string()),
        }
    }
}
