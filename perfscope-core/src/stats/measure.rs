//! Measures and measurements
//!
//! A measure names a quantity that instrumented code records. Views aggregate
//! the measurements of one measure.

use serde::{Deserialize, Serialize};

/// Unit for plain counts
pub const UNIT_DIMENSIONLESS: &str = "1";

/// Unit for byte sizes
pub const UNIT_BYTES: &str = "By";

/// Unit for latencies
pub const UNIT_MILLISECONDS: &str = "ms";

/// Value type recorded against a measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasureKind {
    /// Integer values
    Int64,
    /// Floating point values
    Float64,
}

/// A named quantity that can be recorded
///
/// # Examples
///
/// ```
/// use perfscope_core::stats::{Measure, MeasureKind, UNIT_MILLISECONDS};
///
/// let latency = Measure::float64("app/latency", "Request latency", UNIT_MILLISECONDS);
/// assert_eq!(latency.kind, MeasureKind::Float64);
///
/// let measurement = latency.m(12.5);
/// assert_eq!(measurement.value, 12.5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Measure {
    /// Unique measure name
    pub name: String,
    /// Human readable description
    pub description: String,
    /// Unit (UCUM)
    pub unit: String,
    /// Value type
    pub kind: MeasureKind,
}

impl Measure {
    /// Create an integer measure
    pub fn int64(
        name: impl Into<String>,
        description: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            unit: unit.into(),
            kind: MeasureKind::Int64,
        }
    }

    /// Create a floating point measure
    pub fn float64(
        name: impl Into<String>,
        description: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            unit: unit.into(),
            kind: MeasureKind::Float64,
        }
    }

    /// Create a measurement of this measure
    pub fn m(&self, value: f64) -> Measurement {
        let value = match self.kind {
            MeasureKind::Int64 => value.trunc(),
            MeasureKind::Float64 => value,
        };

        Measurement {
            measure: self.name.clone(),
            value,
        }
    }
}

/// A single recorded value
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Name of the measure the value belongs to
    pub measure: String,
    /// Recorded value
    pub value: f64,
}
