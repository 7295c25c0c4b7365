//! View registry
//!
//! Holds registered views with their aggregated rows and the exporters that
//! receive periodic snapshots.

use super::{Measurement, Row, Tag, TagMap, View, ViewData};
use crate::error::{TelemetryError, TelemetryResult};
use crate::registration::RegistrationId;
use crate::stats::AggregationData;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Default interval between pushes to registered view exporters
pub const DEFAULT_REPORTING_PERIOD: Duration = Duration::from_secs(10);

/// Shortest accepted reporting period
pub const MIN_REPORTING_PERIOD: Duration = Duration::from_secs(1);

/// Receives view snapshots
pub trait ViewExporter: Send + Sync {
    /// Export one view snapshot
    fn export_view(&self, data: &ViewData);
}

struct ViewEntry {
    view: View,
    start: DateTime<Utc>,
    rows: BTreeMap<Vec<Tag>, Box<dyn AggregationData>>,
}

/// Registry of views and view exporters
///
/// # Examples
///
/// ```
/// use perfscope_core::stats::*;
///
/// let registry = StatsRegistry::new();
/// let requests = Measure::int64("app/requests", "Requests", UNIT_DIMENSIONLESS);
/// let view = View::new("app/request_count", requests.clone(), Aggregation::Count);
///
/// registry.register_views(&[view]).unwrap();
/// registry.record(&TagMap::new(), &[requests.m(1.0)]);
///
/// let snapshot = registry.collect();
/// assert_eq!(snapshot.len(), 1);
/// assert_eq!(snapshot[0].rows.len(), 1);
/// ```
pub struct StatsRegistry {
    views: RwLock<BTreeMap<String, ViewEntry>>,
    exporters: RwLock<Vec<(RegistrationId, Arc<dyn ViewExporter>)>>,
    reporting_period: RwLock<Duration>,
}

impl Default for StatsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            views: RwLock::new(BTreeMap::new()),
            exporters: RwLock::new(Vec::new()),
            reporting_period: RwLock::new(DEFAULT_REPORTING_PERIOD),
        }
    }

    /// Register views
    ///
    /// Re-registering an identical view is a no-op. Returns the names of the
    /// views that were not registered before this call. Processing stops at
    /// the first invalid or conflicting view; views before it stay registered.
    pub fn register_views(&self, views: &[View]) -> TelemetryResult<Vec<String>> {
        let mut registered = Vec::new();
        let mut entries = self.views.write();

        for view in views {
            view.validate()?;

            match entries.get(&view.name) {
                Some(existing) if existing.view == *view => {}
                Some(_) => return Err(TelemetryError::ViewConflict(view.name.clone())),
                None => {
                    entries.insert(
                        view.name.clone(),
                        ViewEntry {
                            view: view.clone(),
                            start: Utc::now(),
                            rows: BTreeMap::new(),
                        },
                    );
                    registered.push(view.name.clone());
                    tracing::debug!(view = %view.name, "view registered");
                }
            }
        }

        Ok(registered)
    }

    /// Unregister views by name, dropping their collected rows
    pub fn unregister_views<S: AsRef<str>>(&self, names: &[S]) {
        let mut entries = self.views.write();
        for name in names {
            if entries.remove(name.as_ref()).is_some() {
                tracing::debug!(view = name.as_ref(), "view unregistered");
            }
        }
    }

    /// Whether a view with this name is registered
    pub fn is_registered(&self, name: &str) -> bool {
        self.views.read().contains_key(name)
    }

    /// Definition of a registered view
    pub fn find_view(&self, name: &str) -> Option<View> {
        self.views.read().get(name).map(|e| e.view.clone())
    }

    /// Names of all registered views, sorted
    pub fn view_names(&self) -> Vec<String> {
        self.views.read().keys().cloned().collect()
    }

    /// Record measurements under a set of tags
    ///
    /// Each measurement is folded into every registered view over its
    /// measure. Tags the view does not declare are ignored; declared tags
    /// missing from `tags` are left out of the row key.
    pub fn record(&self, tags: &TagMap, measurements: &[Measurement]) {
        let mut entries = self.views.write();

        for measurement in measurements {
            if measurement.value.is_nan() {
                tracing::debug!(measure = %measurement.measure, "dropping NaN measurement");
                continue;
            }

            for entry in entries
                .values_mut()
                .filter(|e| e.view.measure.name == measurement.measure)
            {
                let key: Vec<Tag> = entry
                    .view
                    .tag_keys
                    .iter()
                    .filter_map(|k| tags.get(k).map(|v| Tag::new(k.clone(), v)))
                    .collect();

                let aggregation = &entry.view.aggregation;
                entry
                    .rows
                    .entry(key)
                    .or_insert_with(|| aggregation.new_data())
                    .add_sample(measurement.value);
            }
        }
    }

    /// Snapshot every view that has at least one row
    pub fn collect(&self) -> Vec<ViewData> {
        let end = Utc::now();

        self.views
            .read()
            .values()
            .filter(|e| !e.rows.is_empty())
            .map(|e| ViewData {
                view: e.view.clone(),
                start: e.start,
                end,
                rows: e
                    .rows
                    .iter()
                    .map(|(tags, data)| Row {
                        tags: tags.clone(),
                        data: data.clone(),
                    })
                    .collect(),
            })
            .collect()
    }

    /// Register a view exporter
    pub fn register_exporter(&self, exporter: Arc<dyn ViewExporter>) -> RegistrationId {
        let id = RegistrationId::next();
        self.exporters.write().push((id, exporter));
        id
    }

    /// Unregister a view exporter; returns whether it was registered
    pub fn unregister_exporter(&self, id: RegistrationId) -> bool {
        let mut exporters = self.exporters.write();
        let before = exporters.len();
        exporters.retain(|(existing, _)| *existing != id);
        exporters.len() != before
    }

    /// Number of registered view exporters
    pub fn exporter_count(&self) -> usize {
        self.exporters.read().len()
    }

    /// Push a snapshot of every view to every registered exporter
    pub fn report(&self) {
        let exporters: Vec<Arc<dyn ViewExporter>> = self
            .exporters
            .read()
            .iter()
            .map(|(_, e)| Arc::clone(e))
            .collect();

        if exporters.is_empty() {
            return;
        }

        for data in self.collect() {
            for exporter in &exporters {
                exporter.export_view(&data);
            }
        }
    }

    /// Interval at which registered exporters should be fed
    pub fn reporting_period(&self) -> Duration {
        *self.reporting_period.read()
    }

    /// Change the reporting period; values below one second are clamped
    pub fn set_reporting_period(&self, period: Duration) {
        *self.reporting_period.write() = period.max(MIN_REPORTING_PERIOD);
    }
}
