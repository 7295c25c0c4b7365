//! Conversion of view data and spans to Cloud Monitoring / Cloud Trace JSON.

use crate::resource::MonitoredResource;
use chrono::{DateTime, Utc};
use opentelemetry::Value;
use opentelemetry::trace::{SpanKind, Status};
use perfscope_core::stats::{
    AggregationData, CountData, DistributionData, LastValueData, Row, SumData, ViewData,
};
use perfscope_core::trace::SpanRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Domain every custom metric type lives under.
pub const CUSTOM_METRIC_DOMAIN: &str = "custom.googleapis.com/opencensus";

/// Label identifying the exporting process when no resource is configured.
pub const TASK_LABEL: &str = "opencensus_task";

/// Attribute naming the exporting agent on every span.
pub const AGENT_LABEL: &str = "g.co/agent";

const MAX_DISPLAY_NAME_BYTES: usize = 128;
const MAX_ATTRIBUTE_VALUE_BYTES: usize = 256;

/// `timeSeries.create` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTimeSeriesRequest {
    pub time_series: Vec<TimeSeries>,
}

/// One time series with a single point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeries {
    pub metric: Metric,
    pub resource: MonitoredResource,
    pub metric_kind: MetricKind,
    pub value_type: ValueType,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    #[serde(rename = "type")]
    pub metric_type: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricKind {
    Gauge,
    Cumulative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    Int64,
    Double,
    Distribution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub interval: TimeInterval,
    pub value: TypedValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeInterval {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: DateTime<Utc>,
}

/// Point value; exactly one field is set.
///
/// 64-bit integers travel as JSON strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub int64_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub double_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution_value: Option<Distribution>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub count: String,
    pub mean: f64,
    pub sum_of_squared_deviation: f64,
    pub bucket_options: BucketOptions,
    pub bucket_counts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketOptions {
    pub explicit_buckets: ExplicitBuckets,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplicitBuckets {
    pub bounds: Vec<f64>,
}

/// Per-exporter settings applied to every series.
#[derive(Debug, Clone)]
pub struct SeriesContext {
    pub metric_prefix: String,
    pub resource: MonitoredResource,
    pub default_labels: BTreeMap<String, String>,
}

impl SeriesContext {
    /// Full metric type for a view.
    pub fn metric_type(&self, view_name: &str) -> String {
        format!(
            "{}/{}/{}",
            CUSTOM_METRIC_DOMAIN,
            self.metric_prefix.trim_matches('/'),
            view_name
        )
    }
}

/// `rust-<pid>@<hostname>`
pub fn task_label_value() -> String {
    let host = std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string());
    format!("rust-{}@{}", std::process::id(), host)
}

/// Label keys may only hold letters, digits and underscores.
pub fn sanitize_label_key(key: &str) -> String {
    let mut sanitized: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    if sanitized.starts_with(|c: char| c.is_ascii_digit()) {
        sanitized.insert_str(0, "key_");
    }
    sanitized
}

/// Convert one view snapshot; rows with unknown data are skipped.
pub fn view_to_time_series(data: &ViewData, ctx: &SeriesContext) -> Vec<TimeSeries> {
    let metric_type = ctx.metric_type(&data.view.name);

    data.rows
        .iter()
        .filter_map(|row| {
            let Some((metric_kind, value_type, value)) = typed_value(row.data.as_ref()) else {
                tracing::warn!(
                    view = %data.view.name,
                    data = ?row.data,
                    "unsupported aggregation data, skipping row"
                );
                return None;
            };

            let start_time = match metric_kind {
                MetricKind::Cumulative => Some(data.start),
                MetricKind::Gauge => None,
            };

            Some(TimeSeries {
                metric: Metric {
                    metric_type: metric_type.clone(),
                    labels: row_labels(row, ctx),
                },
                resource: ctx.resource.clone(),
                metric_kind,
                value_type,
                points: vec![Point {
                    interval: TimeInterval {
                        start_time,
                        end_time: data.end,
                    },
                    value,
                }],
            })
        })
        .collect()
}

fn row_labels(row: &Row, ctx: &SeriesContext) -> BTreeMap<String, String> {
    let mut labels = ctx.default_labels.clone();
    for tag in &row.tags {
        labels.insert(sanitize_label_key(tag.key.name()), tag.value.clone());
    }
    labels
}

fn typed_value(data: &dyn AggregationData) -> Option<(MetricKind, ValueType, TypedValue)> {
    let any = data.as_any();

    if let Some(c) = any.downcast_ref::<CountData>() {
        Some((
            MetricKind::Cumulative,
            ValueType::Int64,
            TypedValue {
                int64_value: Some(c.value.to_string()),
                ..Default::default()
            },
        ))
    } else if let Some(s) = any.downcast_ref::<SumData>() {
        Some((
            MetricKind::Cumulative,
            ValueType::Double,
            TypedValue {
                double_value: Some(s.value),
                ..Default::default()
            },
        ))
    } else if let Some(l) = any.downcast_ref::<LastValueData>() {
        Some((
            MetricKind::Gauge,
            ValueType::Double,
            TypedValue {
                double_value: Some(l.value),
                ..Default::default()
            },
        ))
    } else if let Some(d) = any.downcast_ref::<DistributionData>() {
        Some((
            MetricKind::Cumulative,
            ValueType::Distribution,
            TypedValue {
                distribution_value: Some(distribution(d)),
                ..Default::default()
            },
        ))
    } else {
        None
    }
}

fn distribution(d: &DistributionData) -> Distribution {
    Distribution {
        count: d.count.to_string(),
        mean: d.mean,
        sum_of_squared_deviation: d.sum_of_squared_dev,
        bucket_options: BucketOptions {
            explicit_buckets: ExplicitBuckets {
                bounds: d.bounds.clone(),
            },
        },
        bucket_counts: d.count_per_bucket.iter().map(i64::to_string).collect(),
    }
}

/// `traces:batchWrite` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchWriteSpansRequest {
    pub spans: Vec<TraceSpan>,
}

/// Cloud Trace v2 span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceSpan {
    pub name: String,
    pub span_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    pub display_name: TruncatableString,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub attributes: Attributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SpanStatus>,
    pub span_kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TruncatableString {
    pub value: String,
    pub truncated_byte_count: usize,
}

impl TruncatableString {
    /// Truncate to at most `max_bytes` on a char boundary.
    pub fn new(value: &str, max_bytes: usize) -> Self {
        let mut end = value.len().min(max_bytes);
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        Self {
            value: value[..end].to_string(),
            truncated_byte_count: value.len() - end,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attributes {
    pub attribute_map: BTreeMap<String, AttributeValue>,
    pub dropped_attributes_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub string_value: Option<TruncatableString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub int_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bool_value: Option<bool>,
}

/// `google.rpc.Status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanStatus {
    pub code: i32,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub message: String,
}

fn attribute_value(value: &Value) -> AttributeValue {
    match value {
        Value::Bool(b) => AttributeValue {
            bool_value: Some(*b),
            ..Default::default()
        },
        Value::I64(i) => AttributeValue {
            int_value: Some(i.to_string()),
            ..Default::default()
        },
        other => AttributeValue {
            string_value: Some(TruncatableString::new(
                &other.to_string(),
                MAX_ATTRIBUTE_VALUE_BYTES,
            )),
            ..Default::default()
        },
    }
}

fn span_kind(kind: &SpanKind) -> &'static str {
    match kind {
        SpanKind::Server => "SERVER",
        SpanKind::Client => "CLIENT",
        SpanKind::Producer => "PRODUCER",
        SpanKind::Consumer => "CONSUMER",
        _ => "INTERNAL",
    }
}

fn span_status(status: &Status) -> Option<SpanStatus> {
    match status {
        Status::Unset => None,
        Status::Ok => Some(SpanStatus {
            code: 0,
            message: String::new(),
        }),
        Status::Error { description } => Some(SpanStatus {
            // google.rpc.Code.UNKNOWN
            code: 2,
            message: description.to_string(),
        }),
    }
}

/// Convert a finished span.
pub fn span_to_trace_span(project_id: &str, span: &SpanRecord) -> TraceSpan {
    let mut attribute_map: BTreeMap<String, AttributeValue> = span
        .attributes
        .iter()
        .map(|kv| (kv.key.as_str().to_string(), attribute_value(&kv.value)))
        .collect();

    attribute_map.insert(
        AGENT_LABEL.to_string(),
        AttributeValue {
            string_value: Some(TruncatableString::new(
                concat!("perfscope-rust ", env!("CARGO_PKG_VERSION")),
                MAX_ATTRIBUTE_VALUE_BYTES,
            )),
            ..Default::default()
        },
    );

    TraceSpan {
        name: format!(
            "projects/{}/traces/{}/spans/{}",
            project_id, span.trace_id, span.span_id
        ),
        span_id: span.span_id.to_string(),
        parent_span_id: span.parent_span_id.map(|id| id.to_string()),
        display_name: TruncatableString::new(&span.name, MAX_DISPLAY_NAME_BYTES),
        start_time: span.start_time,
        end_time: span.end_time,
        attributes: Attributes {
            attribute_map,
            dropped_attributes_count: 0,
        },
        status: span_status(&span.status),
        span_kind: span_kind(&span.kind).to_string(),
    }
}
