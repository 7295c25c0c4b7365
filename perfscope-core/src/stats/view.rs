//! Views and view data

use super::{Aggregation, AggregationData, Measure, Tag, TagKey};
use crate::error::{TelemetryError, TelemetryResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named aggregation rule over one measure
///
/// # Examples
///
/// ```
/// use perfscope_core::stats::{Aggregation, Measure, TagKey, View, UNIT_MILLISECONDS};
///
/// let latency = Measure::float64("app/latency", "Latency", UNIT_MILLISECONDS);
/// let view = View::new("app/latency_by_route", latency, Aggregation::distribution(vec![10.0, 100.0]))
///     .with_description("Latency per route")
///     .with_tag_keys([TagKey::new("route")]);
///
/// assert!(view.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    /// Unique view name
    pub name: String,
    /// Human readable description
    pub description: String,
    /// Measure being aggregated
    pub measure: Measure,
    /// Tag keys that split the view into rows
    pub tag_keys: Vec<TagKey>,
    /// Aggregation applied per row
    pub aggregation: Aggregation,
}

impl View {
    /// Create a view; the description defaults to the measure's description
    pub fn new(name: impl Into<String>, measure: Measure, aggregation: Aggregation) -> Self {
        Self {
            name: name.into(),
            description: measure.description.clone(),
            measure,
            tag_keys: Vec::new(),
            aggregation,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the tag keys
    pub fn with_tag_keys(mut self, keys: impl IntoIterator<Item = TagKey>) -> Self {
        self.tag_keys = keys.into_iter().collect();
        self
    }

    /// Validate the definition
    pub fn validate(&self) -> TelemetryResult<()> {
        if self.name.is_empty() {
            return Err(TelemetryError::InvalidView(
                "View name cannot be empty".to_string(),
            ));
        }

        if self.measure.name.is_empty() {
            return Err(TelemetryError::InvalidView(format!(
                "View '{}' has a measure without a name",
                self.name
            )));
        }

        if let Aggregation::Distribution { bounds } = &self.aggregation {
            if bounds.iter().any(|b| !b.is_finite()) {
                return Err(TelemetryError::InvalidView(format!(
                    "View '{}' has non-finite bucket bounds",
                    self.name
                )));
            }

            if bounds.windows(2).any(|w| w[0] >= w[1]) {
                return Err(TelemetryError::InvalidView(format!(
                    "View '{}' bucket bounds must be strictly increasing",
                    self.name
                )));
            }
        }

        Ok(())
    }
}

/// One tag-set / data pair of a view snapshot
#[derive(Debug, Clone)]
pub struct Row {
    /// Tags identifying the row, in view tag key order
    pub tags: Vec<Tag>,
    /// Aggregated value
    pub data: Box<dyn AggregationData>,
}

/// Snapshot of one view
#[derive(Debug, Clone)]
pub struct ViewData {
    /// View definition
    pub view: View,
    /// Start of the aggregation window
    pub start: DateTime<Utc>,
    /// End of the aggregation window
    pub end: DateTime<Utc>,
    /// Rows of the snapshot
    pub rows: Vec<Row>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::UNIT_DIMENSIONLESS;

    fn measure() -> Measure {
        Measure::int64("test/measure", "A test measure", UNIT_DIMENSIONLESS)
    }

    #[test]
    fn test_description_defaults_to_measure() {
        let view = View::new("test/view", measure(), Aggregation::Count);
        assert_eq!(view.description, "A test measure");
    }

    #[test]
    fn test_validate_empty_name() {
        let view = View::new("", measure(), Aggregation::Count);
        assert!(matches!(view.validate(), Err(TelemetryError::InvalidView(_))));
    }

    #[test]
    fn test_validate_unsorted_bounds() {
        let view = View::new("test/view", measure(), Aggregation::distribution(vec![5.0, 1.0]));
        assert!(view.validate().is_err());
    }

    #[test]
    fn test_validate_duplicate_bounds() {
        let view = View::new("test/view", measure(), Aggregation::distribution(vec![1.0, 1.0]));
        assert!(view.validate().is_err());
    }

    #[test]
    fn test_validate_empty_bounds_is_ok() {
        let view = View::new("test/view", measure(), Aggregation::distribution(Vec::new()));
        assert!(view.validate().is_ok());
    }
}
