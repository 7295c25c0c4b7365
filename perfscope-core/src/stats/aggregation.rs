//! Aggregations and the data they produce
//!
//! An [`Aggregation`] describes how a view folds measurements; each row of a
//! view holds one [`AggregationData`] value. Exporters recognise the concrete
//! data types by downcasting through [`AggregationData::as_any`].

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

/// How measurements of a view are folded together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Number of measurements
    Count,
    /// Sum of measured values
    Sum,
    /// Most recent value
    LastValue,
    /// Histogram with explicit bucket bounds
    Distribution {
        /// Upper bounds (exclusive) of every bucket but the last
        bounds: Vec<f64>,
    },
}

impl Aggregation {
    /// Distribution aggregation over the given bucket bounds
    pub fn distribution(bounds: impl Into<Vec<f64>>) -> Self {
        Aggregation::Distribution {
            bounds: bounds.into(),
        }
    }

    /// Short name of the aggregation kind
    pub fn kind(&self) -> &'static str {
        match self {
            Aggregation::Count => "count",
            Aggregation::Sum => "sum",
            Aggregation::LastValue => "last_value",
            Aggregation::Distribution { .. } => "distribution",
        }
    }

    /// Fresh, empty data for one row of this aggregation
    pub fn new_data(&self) -> Box<dyn AggregationData> {
        match self {
            Aggregation::Count => Box::new(CountData::default()),
            Aggregation::Sum => Box::new(SumData::default()),
            Aggregation::LastValue => Box::new(LastValueData::default()),
            Aggregation::Distribution { bounds } => Box::new(DistributionData::new(bounds.clone())),
        }
    }
}

/// Aggregated value of one row
pub trait AggregationData: fmt::Debug + Send + Sync {
    /// Fold one measured value into the aggregate
    fn add_sample(&mut self, value: f64);

    /// Clone into a new box
    fn clone_data(&self) -> Box<dyn AggregationData>;

    /// Access the concrete type
    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn AggregationData> {
    fn clone(&self) -> Self {
        self.clone_data()
    }
}

/// Count aggregate
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountData {
    /// Number of samples
    pub value: i64,
}

impl AggregationData for CountData {
    fn add_sample(&mut self, _value: f64) {
        self.value += 1;
    }

    fn clone_data(&self) -> Box<dyn AggregationData> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Sum aggregate
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SumData {
    /// Sum of samples
    pub value: f64,
}

impl AggregationData for SumData {
    fn add_sample(&mut self, value: f64) {
        self.value += value;
    }

    fn clone_data(&self) -> Box<dyn AggregationData> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Last value aggregate
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LastValueData {
    /// Most recent sample
    pub value: f64,
}

impl AggregationData for LastValueData {
    fn add_sample(&mut self, value: f64) {
        self.value = value;
    }

    fn clone_data(&self) -> Box<dyn AggregationData> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Distribution aggregate
///
/// Mean and sum of squared deviation are maintained incrementally
/// (Welford), so they stay accurate over long-lived rows.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionData {
    /// Number of samples
    pub count: i64,
    /// Smallest sample
    pub min: f64,
    /// Largest sample
    pub max: f64,
    /// Arithmetic mean
    pub mean: f64,
    /// Sum of squared deviation from the mean
    pub sum_of_squared_dev: f64,
    /// Samples per bucket; one more entry than `bounds`
    pub count_per_bucket: Vec<i64>,
    /// Bucket bounds
    pub bounds: Vec<f64>,
}

impl DistributionData {
    /// Empty distribution over the given bounds
    pub fn new(bounds: Vec<f64>) -> Self {
        Self {
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            mean: 0.0,
            sum_of_squared_dev: 0.0,
            count_per_bucket: vec![0; bounds.len() + 1],
            bounds,
        }
    }

    /// Sum of all samples
    pub fn sum(&self) -> f64 {
        self.mean * self.count as f64
    }

    /// Sample variance, zero for fewer than two samples
    pub fn variance(&self) -> f64 {
        if self.count > 1 {
            self.sum_of_squared_dev / (self.count - 1) as f64
        } else {
            0.0
        }
    }
}

impl AggregationData for DistributionData {
    fn add_sample(&mut self, value: f64) {
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.sum_of_squared_dev += delta * (value - self.mean);

        let bucket = self
            .bounds
            .iter()
            .position(|bound| value < *bound)
            .unwrap_or(self.bounds.len());
        self.count_per_bucket[bucket] += 1;
    }

    fn clone_data(&self) -> Box<dyn AggregationData> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold(aggregation: &Aggregation, samples: &[f64]) -> Box<dyn AggregationData> {
        let mut data = aggregation.new_data();
        for sample in samples {
            data.add_sample(*sample);
        }
        data
    }

    #[test]
    fn test_count() {
        let data = fold(&Aggregation::Count, &[5.0, 7.0, 9.0]);
        let count = data.as_any().downcast_ref::<CountData>().unwrap();
        assert_eq!(count.value, 3);
    }

    #[test]
    fn test_sum() {
        let data = fold(&Aggregation::Sum, &[1.5, 2.5]);
        let sum = data.as_any().downcast_ref::<SumData>().unwrap();
        assert_eq!(sum.value, 4.0);
    }

    #[test]
    fn test_last_value() {
        let data = fold(&Aggregation::LastValue, &[1.0, 8.0, 3.0]);
        let last = data.as_any().downcast_ref::<LastValueData>().unwrap();
        assert_eq!(last.value, 3.0);
    }

    #[test]
    fn test_distribution_statistics() {
        let data = fold(&Aggregation::distribution(vec![2.0, 5.0]), &[1.0, 2.0, 3.0, 6.0]);
        let dist = data.as_any().downcast_ref::<DistributionData>().unwrap();

        assert_eq!(dist.count, 4);
        assert_eq!(dist.min, 1.0);
        assert_eq!(dist.max, 6.0);
        assert_eq!(dist.mean, 3.0);
        assert_eq!(dist.sum(), 12.0);
        // deviations: -2, -1, 0, 3 => 4 + 1 + 0 + 9
        assert!((dist.sum_of_squared_dev - 14.0).abs() < 1e-9);
        assert_eq!(dist.count_per_bucket, vec![1, 2, 1]);
    }

    #[test]
    fn test_distribution_bucket_bound_is_exclusive() {
        let data = fold(&Aggregation::distribution(vec![10.0]), &[10.0]);
        let dist = data.as_any().downcast_ref::<DistributionData>().unwrap();
        assert_eq!(dist.count_per_bucket, vec![0, 1]);
    }

    #[test]
    fn test_boxed_clone_is_independent() {
        let mut original = fold(&Aggregation::Count, &[1.0]);
        let copy = original.clone();
        original.add_sample(1.0);

        assert_eq!(copy.as_any().downcast_ref::<CountData>().unwrap().value, 1);
        assert_eq!(original.as_any().downcast_ref::<CountData>().unwrap().value, 2);
    }
}
