//! HTTP client and server views

use crate::buckets::{DEFAULT_BYTES_DISTRIBUTION, DEFAULT_LATENCY_DISTRIBUTION};
use once_cell::sync::Lazy;
use perfscope_core::stats::{
    Aggregation, Measure, StatsRegistry, TagKey, TagMap, UNIT_BYTES, UNIT_DIMENSIONLESS,
    UNIT_MILLISECONDS, View,
};
use perfscope_core::{Telemetry, TelemetryResult};

pub static KEY_CLIENT_METHOD: Lazy<TagKey> = Lazy::new(|| TagKey::new("http_client_method"));
pub static KEY_CLIENT_STATUS: Lazy<TagKey> = Lazy::new(|| TagKey::new("http_client_status"));
pub static KEY_SERVER_METHOD: Lazy<TagKey> = Lazy::new(|| TagKey::new("http.method"));
pub static KEY_SERVER_STATUS: Lazy<TagKey> = Lazy::new(|| TagKey::new("http.status"));
pub static KEY_SERVER_ROUTE: Lazy<TagKey> = Lazy::new(|| TagKey::new("http_server_route"));

pub static CLIENT_SENT_BYTES: Lazy<Measure> = Lazy::new(|| {
    Measure::int64(
        "opencensus.io/http/client/sent_bytes",
        "Total bytes sent in request body (not including headers)",
        UNIT_BYTES,
    )
});

pub static CLIENT_RECEIVED_BYTES: Lazy<Measure> = Lazy::new(|| {
    Measure::int64(
        "opencensus.io/http/client/received_bytes",
        "Total bytes received in response bodies (not including headers but including error responses with bodies)",
        UNIT_BYTES,
    )
});

pub static CLIENT_ROUNDTRIP_LATENCY: Lazy<Measure> = Lazy::new(|| {
    Measure::float64(
        "opencensus.io/http/client/roundtrip_latency",
        "Time between first byte of request headers sent to last byte of response received, or terminal error",
        UNIT_MILLISECONDS,
    )
});

pub static SERVER_REQUEST_COUNT: Lazy<Measure> = Lazy::new(|| {
    Measure::int64(
        "opencensus.io/http/server/request_count",
        "Number of HTTP requests started",
        UNIT_DIMENSIONLESS,
    )
});

pub static SERVER_REQUEST_BYTES: Lazy<Measure> = Lazy::new(|| {
    Measure::int64(
        "opencensus.io/http/server/request_bytes",
        "HTTP request body size if set as ContentLength (uncompressed)",
        UNIT_BYTES,
    )
});

pub static SERVER_RESPONSE_BYTES: Lazy<Measure> = Lazy::new(|| {
    Measure::int64(
        "opencensus.io/http/server/response_bytes",
        "HTTP response body size (uncompressed)",
        UNIT_BYTES,
    )
});

pub static SERVER_LATENCY: Lazy<Measure> = Lazy::new(|| {
    Measure::float64(
        "opencensus.io/http/server/latency",
        "End-to-end latency",
        UNIT_MILLISECONDS,
    )
});

/// Default client views
pub fn client_views() -> Vec<View> {
    let method = KEY_CLIENT_METHOD.clone();
    let status = KEY_CLIENT_STATUS.clone();
    let bytes = || Aggregation::distribution(DEFAULT_BYTES_DISTRIBUTION);

    vec![
        View::new(
            "opencensus.io/http/client/sent_bytes",
            CLIENT_SENT_BYTES.clone(),
            bytes(),
        )
        .with_description("Total bytes sent in request body (not including headers), by HTTP method and response status")
        .with_tag_keys([method.clone(), status.clone()]),
        View::new(
            "opencensus.io/http/client/received_bytes",
            CLIENT_RECEIVED_BYTES.clone(),
            bytes(),
        )
        .with_description("Total bytes received in response bodies (not including headers but including error responses with bodies), by HTTP method and response status")
        .with_tag_keys([method.clone(), status.clone()]),
        View::new(
            "opencensus.io/http/client/roundtrip_latency",
            CLIENT_ROUNDTRIP_LATENCY.clone(),
            Aggregation::distribution(DEFAULT_LATENCY_DISTRIBUTION),
        )
        .with_description("End-to-end latency, by HTTP method and response status")
        .with_tag_keys([method.clone(), status.clone()]),
        View::new(
            "opencensus.io/http/client/completed_count",
            CLIENT_ROUNDTRIP_LATENCY.clone(),
            Aggregation::Count,
        )
        .with_description("Count of completed requests, by HTTP method and response status")
        .with_tag_keys([method, status]),
    ]
}

/// Default server views
pub fn server_views() -> Vec<View> {
    let bytes = || Aggregation::distribution(DEFAULT_BYTES_DISTRIBUTION);

    vec![
        View::new(
            "opencensus.io/http/server/request_count",
            SERVER_REQUEST_COUNT.clone(),
            Aggregation::Count,
        )
        .with_description("Count of HTTP requests started"),
        View::new(
            "opencensus.io/http/server/request_bytes",
            SERVER_REQUEST_BYTES.clone(),
            bytes(),
        )
        .with_description("Size distribution of HTTP request body"),
        View::new(
            "opencensus.io/http/server/response_bytes",
            SERVER_RESPONSE_BYTES.clone(),
            bytes(),
        )
        .with_description("Size distribution of HTTP response body"),
        View::new(
            "opencensus.io/http/server/latency",
            SERVER_LATENCY.clone(),
            Aggregation::distribution(DEFAULT_LATENCY_DISTRIBUTION),
        )
        .with_description("Latency distribution of HTTP requests")
        .with_tag_keys([KEY_SERVER_ROUTE.clone()]),
        View::new(
            "opencensus.io/http/server/request_count_by_method",
            SERVER_REQUEST_COUNT.clone(),
            Aggregation::Count,
        )
        .with_description("Server request count by HTTP method")
        .with_tag_keys([KEY_SERVER_METHOD.clone()]),
        View::new(
            "opencensus.io/http/server/response_count_by_status_code",
            SERVER_LATENCY.clone(),
            Aggregation::Count,
        )
        .with_description("Server response count by status code")
        .with_tag_keys([KEY_SERVER_STATUS.clone()]),
    ]
}

/// All default HTTP views
pub fn views() -> Vec<View> {
    let mut views = client_views();
    views.extend(server_views());
    views
}

/// Register the default HTTP views; returns the newly registered names
pub fn register_http_views(registry: &StatsRegistry) -> TelemetryResult<Vec<String>> {
    registry.register_views(&views())
}

/// Common HTTP metrics
#[derive(Clone)]
pub struct HttpMetrics {
    telemetry: Telemetry,
}

impl HttpMetrics {
    pub fn new(telemetry: Telemetry) -> Self {
        Self { telemetry }
    }

    /// Record a served request
    pub fn record_request(
        &self,
        method: &str,
        route: &str,
        status: u16,
        duration_ms: f64,
        request_bytes: u64,
        response_bytes: u64,
    ) {
        let tags = TagMap::new()
            .with(&KEY_SERVER_METHOD, method)
            .with(&KEY_SERVER_ROUTE, route)
            .with(&KEY_SERVER_STATUS, status.to_string());

        self.telemetry.record(
            &tags,
            &[
                SERVER_REQUEST_COUNT.m(1.0),
                SERVER_REQUEST_BYTES.m(request_bytes as f64),
                SERVER_RESPONSE_BYTES.m(response_bytes as f64),
                SERVER_LATENCY.m(duration_ms),
            ],
        );
    }

    /// Record an outgoing request
    pub fn record_client_request(
        &self,
        method: &str,
        status: u16,
        duration_ms: f64,
        sent_bytes: u64,
        received_bytes: u64,
    ) {
        let tags = TagMap::new()
            .with(&KEY_CLIENT_METHOD, method)
            .with(&KEY_CLIENT_STATUS, status.to_string());

        self.telemetry.record(
            &tags,
            &[
                CLIENT_ROUNDTRIP_LATENCY.m(duration_ms),
                CLIENT_SENT_BYTES.m(sent_bytes as f64),
                CLIENT_RECEIVED_BYTES.m(received_bytes as f64),
            ],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perfscope_core::stats::{CountData, DistributionData};

    #[test]
    fn test_views_are_valid() {
        let views = views();
        assert_eq!(views.len(), 10);
        assert!(views.iter().all(|v| v.validate().is_ok()));
    }

    #[test]
    fn test_record_request() {
        let telemetry = Telemetry::new();
        register_http_views(telemetry.stats()).unwrap();
        let metrics = HttpMetrics::new(telemetry.clone());

        metrics.record_request("GET", "/users", 200, 12.0, 0, 2048);
        metrics.record_request("POST", "/users", 201, 30.0, 512, 64);

        let data = telemetry.stats().collect();
        let by_method = data
            .iter()
            .find(|d| d.view.name == "opencensus.io/http/server/request_count_by_method")
            .unwrap();
        assert_eq!(by_method.rows.len(), 2);

        let latency = data
            .iter()
            .find(|d| d.view.name == "opencensus.io/http/server/latency")
            .unwrap();
        assert_eq!(latency.rows.len(), 1);
        let dist = latency.rows[0]
            .data
            .as_any()
            .downcast_ref::<DistributionData>()
            .unwrap();
        assert_eq!(dist.count, 2);
        assert_eq!(dist.min, 12.0);
        assert_eq!(dist.max, 30.0);

        let requests = data
            .iter()
            .find(|d| d.view.name == "opencensus.io/http/server/request_count")
            .unwrap();
        let count = requests.rows[0].data.as_any().downcast_ref::<CountData>().unwrap();
        assert_eq!(count.value, 2);
    }
}
