//! Stats: measures, views and aggregation
//!
//! Instrumented code records [`Measurement`]s under a [`TagMap`]; registered
//! [`View`]s fold them into rows; exporters read [`ViewData`] snapshots.

mod aggregation;
mod measure;
mod registry;
mod reporter;
mod tags;
mod view;

pub use aggregation::{
    Aggregation, AggregationData, CountData, DistributionData, LastValueData, SumData,
};
pub use measure::{
    Measure, MeasureKind, Measurement, UNIT_BYTES, UNIT_DIMENSIONLESS, UNIT_MILLISECONDS,
};
pub use registry::{
    DEFAULT_REPORTING_PERIOD, MIN_REPORTING_PERIOD, StatsRegistry, ViewExporter,
};
pub use reporter::PeriodicReporter;
pub use tags::{Tag, TagKey, TagMap};
pub use view::{Row, View, ViewData};
