//! Application views for perfscope
//!
//! The gRPC and HTTP views every perfscope exporter registers before it
//! starts, together with their measures, tag keys and small recording
//! helpers.
//!
//! # Examples
//!
//! ```
//! use perfscope_core::Telemetry;
//! use perfscope_views::register_application_views;
//!
//! let telemetry = Telemetry::new();
//! let added = register_application_views(telemetry.stats()).unwrap();
//! assert_eq!(added.len(), perfscope_views::application_views().len());
//!
//! // A second registration adds nothing
//! assert!(register_application_views(telemetry.stats()).unwrap().is_empty());
//! ```

pub mod buckets;
pub mod grpc;
pub mod http;

pub use grpc::{GrpcMetrics, RpcStats};
pub use http::HttpMetrics;

use perfscope_core::stats::{StatsRegistry, View};
use perfscope_core::{TelemetryError, TelemetryResult};

/// Every application view: gRPC client, gRPC server, HTTP client, HTTP server
pub fn application_views() -> Vec<View> {
    let mut views = grpc::views();
    views.extend(http::views());
    views
}

/// Register the application views
///
/// Both view groups are attempted even if the first one fails; failures are
/// combined into one error. On success returns the names that were newly
/// registered.
pub fn register_application_views(registry: &StatsRegistry) -> TelemetryResult<Vec<String>> {
    let mut registered = Vec::new();
    let mut errors = Vec::new();

    for result in [
        grpc::register_grpc_views(registry),
        http::register_http_views(registry),
    ] {
        match result {
            Ok(names) => registered.extend(names),
            Err(e) => errors.push(e),
        }
    }

    match TelemetryError::combine(errors) {
        Some(err) => {
            tracing::warn!(error = %err, "failed to register application views");
            Err(err)
        }
        None => {
            tracing::debug!(count = registered.len(), "application views registered");
            Ok(registered)
        }
    }
}
