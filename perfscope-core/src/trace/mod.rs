//! Trace: span records, sampling and the trace registry

mod registry;
mod sampler;
mod span;

pub use registry::{SpanExporter, TraceRegistry};
pub use sampler::{DEFAULT_SAMPLING_PROBABILITY, Sampler, TraceConfig};
pub use span::{ActiveSpan, SpanRecord};
