//! # perfscope Stackdriver
//!
//! Exports perfscope view data to Google Cloud Monitoring and spans to
//! Google Cloud Trace.
//!
//! On Cloud Run (`K_SERVICE` set) every time series is attached to a
//! `gae_instance` resource built from the service, revision, zone and
//! instance id. Zone and instance id may be overridden with
//! `GCP_COMPUTE_ZONE` and `GCP_INSTANCE_ID`; otherwise they are read from
//! the metadata server. Elsewhere the `global` resource is used and each
//! series carries an `opencensus_task` label.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use perfscope_core::{Exporter, Telemetry};
//! use perfscope_stackdriver::CloudExporter;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut exporter = CloudExporter::from_env(Telemetry::global()).await?;
//!     exporter.start().await?;
//!
//!     // serve traffic
//!
//!     exporter.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `STACKDRIVER_PROJECT_ID` | Project to write to |
//! | `K_SERVICE` | Cloud Run service name |
//! | `K_REVISION` | Cloud Run revision |
//! | `GCP_COMPUTE_ZONE` | Zone override |
//! | `GCP_INSTANCE_ID` | Instance ID override |

pub mod client;
pub mod config;
pub mod convert;
pub mod error;
pub mod exporter;
pub mod metadata;
pub mod resource;

pub use client::{HttpMonitoringClient, MonitoringClient};
pub use config::{CloudEnvironment, CloudExporterOptions, CloudExporterOptionsBuilder, ErrorHandler};
pub use error::{Result, StackdriverError};
pub use exporter::CloudExporter;
pub use metadata::{GceMetadataClient, MetadataProvider};
pub use resource::{MonitoredResource, detect_resource};
