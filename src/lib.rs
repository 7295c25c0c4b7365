//! # perfscope
//!
//! Metrics and trace exporters behind a single start/stop contract.
//!
//! - [`new_development_exporter`] logs view data and span trees to the console
//! - [`new_cloud_exporter`] ships them to Google Cloud Monitoring and Cloud Trace
//!
//! Both register the shared gRPC and HTTP views when started and undo their
//! registrations when stopped.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use perfscope::{Exporter, Telemetry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     perfscope::init_logging();
//!
//!     let mut exporter = if perfscope::is_managed_serverless() {
//!         perfscope::new_cloud_exporter(Telemetry::global()).await?
//!     } else {
//!         perfscope::new_development_exporter(Telemetry::global())
//!     };
//!     exporter.start().await?;
//!
//!     // serve traffic
//!
//!     exporter.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `console` | Development exporter (default) |
//! | `stackdriver` | Cloud exporter and Cloud Logging output (default) |

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod logging;

pub use logging::{init_logging, init_logging_with_level, is_managed_serverless, try_init_logging};

pub use perfscope_core::*;
pub use perfscope_views as views;

#[cfg(feature = "console")]
pub use perfscope_console as console;

#[cfg(feature = "stackdriver")]
pub use perfscope_stackdriver as stackdriver;

/// Exporter writing to Cloud Monitoring and Cloud Trace
///
/// Project, monitored resource and credentials are resolved from the
/// process environment and the metadata server.
#[cfg(feature = "stackdriver")]
pub async fn new_cloud_exporter(
    telemetry: Telemetry,
) -> perfscope_stackdriver::Result<Box<dyn Exporter>> {
    let exporter = perfscope_stackdriver::CloudExporter::from_env(telemetry).await?;
    Ok(Box::new(exporter))
}

/// Exporter logging view data and traces to the console
#[cfg(feature = "console")]
pub fn new_development_exporter(telemetry: Telemetry) -> Box<dyn Exporter> {
    Box::new(perfscope_console::DevelopmentExporter::new(telemetry))
}

/// Common imports
pub mod prelude {
    pub use crate::{Exporter, LifecycleState, Telemetry, TelemetryError, TelemetryResult};
    pub use perfscope_core::stats::{Aggregation, Measure, TagKey, TagMap, View};
    pub use perfscope_core::{SpanKind, trace::TraceConfig};
    pub use perfscope_views::{GrpcMetrics, HttpMetrics};

    #[cfg(feature = "console")]
    pub use crate::new_development_exporter;

    #[cfg(feature = "stackdriver")]
    pub use crate::new_cloud_exporter;
}
