//! Console exporters for perfscope
//!
//! - [`PrintExporter`] logs aggregated view rows
//! - [`NiceLoggingSpanExporter`] logs finished traces as indented trees
//! - [`DevelopmentExporter`] wires both to a [`Telemetry`](perfscope_core::Telemetry)
//!   handle behind the [`Exporter`](perfscope_core::Exporter) lifecycle
//!
//! Output goes through `tracing` at `info` level under the
//! `perfscope::console` target.

pub mod development;
pub mod print;
pub mod span;

pub use development::DevelopmentExporter;
pub use print::PrintExporter;
pub use span::NiceLoggingSpanExporter;
