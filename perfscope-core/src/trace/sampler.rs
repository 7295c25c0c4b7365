//! Sampling policy

use opentelemetry::trace::TraceId;
use serde::{Deserialize, Serialize};

/// Probability used when nothing else is configured
pub const DEFAULT_SAMPLING_PROBABILITY: f64 = 1e-4;

/// Decides whether a trace is recorded and exported
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sampler {
    /// Sample every trace
    AlwaysSample,
    /// Sample no trace
    NeverSample,
    /// Sample a fraction of traces
    Probability(f64),
}

impl Default for Sampler {
    fn default() -> Self {
        Sampler::Probability(DEFAULT_SAMPLING_PROBABILITY)
    }
}

impl Sampler {
    /// Sampler for a ratio between 0.0 and 1.0
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio >= 1.0 {
            Sampler::AlwaysSample
        } else if ratio <= 0.0 || ratio.is_nan() {
            Sampler::NeverSample
        } else {
            Sampler::Probability(ratio)
        }
    }

    /// Sampling decision for a trace
    ///
    /// Deterministic per trace id, so every span of a trace gets the same
    /// answer.
    pub fn should_sample(&self, trace_id: TraceId) -> bool {
        match *self {
            Sampler::AlwaysSample => true,
            Sampler::NeverSample => false,
            Sampler::Probability(p) if p >= 1.0 => true,
            Sampler::Probability(p) if p <= 0.0 || p.is_nan() => false,
            Sampler::Probability(p) => {
                let bytes = trace_id.to_bytes();
                let mut lower = [0u8; 8];
                lower.copy_from_slice(&bytes[8..]);

                let bound = (p * (1u64 << 63) as f64) as u64;
                (u64::from_be_bytes(lower) >> 1) < bound
            }
        }
    }
}

/// Trace configuration applied to a trace registry
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceConfig {
    /// Sampler used for new root spans
    pub default_sampler: Sampler,
}

impl TraceConfig {
    /// Configuration that samples everything
    pub fn always_sample() -> Self {
        Self {
            default_sampler: Sampler::AlwaysSample,
        }
    }
}
