//! Core of perfscope
//!
//! This crate holds the pieces every perfscope exporter builds on:
//! - Stats: measures, tags, views, aggregation and the view registry
//! - Trace: span records, sampling and the trace registry
//! - The [`Telemetry`] handle bundling both registries
//! - The [`Exporter`] start/stop contract
//!
//! # Examples
//!
//! ## Recording against a view
//!
//! ```
//! use perfscope_core::stats::*;
//! use perfscope_core::Telemetry;
//!
//! let telemetry = Telemetry::new();
//! let latency = Measure::float64("app/latency", "Request latency", UNIT_MILLISECONDS);
//! let route = TagKey::new("route");
//!
//! telemetry
//!     .stats()
//!     .register_views(&[View::new(
//!         "app/latency",
//!         latency.clone(),
//!         Aggregation::distribution(vec![10.0, 100.0, 1000.0]),
//!     )
//!     .with_tag_keys([route.clone()])])
//!     .unwrap();
//!
//! telemetry.record(&TagMap::new().with(&route, "/users"), &[latency.m(42.0)]);
//!
//! let snapshot = telemetry.stats().collect();
//! assert_eq!(snapshot[0].rows[0].tags[0].value, "/users");
//! ```
//!
//! ## Tracing
//!
//! ```
//! use perfscope_core::trace::TraceConfig;
//! use perfscope_core::{SpanKind, Telemetry};
//!
//! let telemetry = Telemetry::new();
//! telemetry.trace().apply_config(TraceConfig::always_sample());
//!
//! let span = telemetry.start_span("handle_request", SpanKind::Server);
//! let child = span.child("query_db", SpanKind::Client);
//! child.end();
//! span.end();
//! ```

pub mod error;
pub mod exporter;
pub mod registration;
pub mod stats;
pub mod telemetry;
pub mod trace;

pub use error::{TelemetryError, TelemetryResult};
pub use exporter::{Exporter, LifecycleState, RegistrationSet};
pub use registration::RegistrationId;
pub use telemetry::Telemetry;

// Re-export the OpenTelemetry API types used in span records
pub use opentelemetry::{
    KeyValue, Value,
    trace::{SpanId, SpanKind, Status, TraceId},
};
