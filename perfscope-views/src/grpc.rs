//! gRPC client and server views

use crate::buckets::{DEFAULT_BYTES_DISTRIBUTION, DEFAULT_MILLISECONDS_DISTRIBUTION};
use once_cell::sync::Lazy;
use perfscope_core::stats::{
    Aggregation, Measure, StatsRegistry, TagKey, TagMap, UNIT_BYTES, UNIT_MILLISECONDS, View,
};
use perfscope_core::{Telemetry, TelemetryResult};

/// Full method name of a client call
pub static KEY_CLIENT_METHOD: Lazy<TagKey> = Lazy::new(|| TagKey::new("grpc_client_method"));
/// Status code of a client call
pub static KEY_CLIENT_STATUS: Lazy<TagKey> = Lazy::new(|| TagKey::new("grpc_client_status"));
/// Full method name of a served call
pub static KEY_SERVER_METHOD: Lazy<TagKey> = Lazy::new(|| TagKey::new("grpc_server_method"));
/// Status code of a served call
pub static KEY_SERVER_STATUS: Lazy<TagKey> = Lazy::new(|| TagKey::new("grpc_server_status"));

/// Bytes sent per client RPC
pub static CLIENT_SENT_BYTES_PER_RPC: Lazy<Measure> = Lazy::new(|| {
    Measure::int64(
        "grpc.io/client/sent_bytes_per_rpc",
        "Total bytes sent across all request messages per RPC.",
        UNIT_BYTES,
    )
});

/// Bytes received per client RPC
pub static CLIENT_RECEIVED_BYTES_PER_RPC: Lazy<Measure> = Lazy::new(|| {
    Measure::int64(
        "grpc.io/client/received_bytes_per_rpc",
        "Total bytes received across all response messages per RPC.",
        UNIT_BYTES,
    )
});

/// Client round trip latency
pub static CLIENT_ROUNDTRIP_LATENCY: Lazy<Measure> = Lazy::new(|| {
    Measure::float64(
        "grpc.io/client/roundtrip_latency",
        "Time between first byte of request sent to last byte of response received, or terminal error.",
        UNIT_MILLISECONDS,
    )
});

/// Bytes received per served RPC
pub static SERVER_RECEIVED_BYTES_PER_RPC: Lazy<Measure> = Lazy::new(|| {
    Measure::int64(
        "grpc.io/server/received_bytes_per_rpc",
        "Total bytes received across all messages per RPC.",
        UNIT_BYTES,
    )
});

/// Bytes sent per served RPC
pub static SERVER_SENT_BYTES_PER_RPC: Lazy<Measure> = Lazy::new(|| {
    Measure::int64(
        "grpc.io/server/sent_bytes_per_rpc",
        "Total bytes sent in across all response messages per RPC.",
        UNIT_BYTES,
    )
});

/// Server side latency
pub static SERVER_LATENCY: Lazy<Measure> = Lazy::new(|| {
    Measure::float64(
        "grpc.io/server/server_latency",
        "Time between first byte of request received to last byte of response sent, or terminal error.",
        UNIT_MILLISECONDS,
    )
});

fn bytes_distribution() -> Aggregation {
    Aggregation::distribution(DEFAULT_BYTES_DISTRIBUTION)
}

fn latency_distribution() -> Aggregation {
    Aggregation::distribution(DEFAULT_MILLISECONDS_DISTRIBUTION)
}

/// Default client views
pub fn client_views() -> Vec<View> {
    let method = KEY_CLIENT_METHOD.clone();
    let status = KEY_CLIENT_STATUS.clone();

    vec![
        View::new(
            "grpc.io/client/sent_bytes_per_rpc",
            CLIENT_SENT_BYTES_PER_RPC.clone(),
            bytes_distribution(),
        )
        .with_description("Distribution of bytes sent per RPC, by method.")
        .with_tag_keys([method.clone()]),
        View::new(
            "grpc.io/client/received_bytes_per_rpc",
            CLIENT_RECEIVED_BYTES_PER_RPC.clone(),
            bytes_distribution(),
        )
        .with_description("Distribution of bytes received per RPC, by method.")
        .with_tag_keys([method.clone()]),
        View::new(
            "grpc.io/client/roundtrip_latency",
            CLIENT_ROUNDTRIP_LATENCY.clone(),
            latency_distribution(),
        )
        .with_description("Distribution of round-trip latency, by method.")
        .with_tag_keys([method.clone()]),
        View::new(
            "grpc.io/client/completed_rpcs",
            CLIENT_ROUNDTRIP_LATENCY.clone(),
            Aggregation::Count,
        )
        .with_description("Count of RPCs by method and status.")
        .with_tag_keys([method, status]),
    ]
}

/// Default server views
pub fn server_views() -> Vec<View> {
    let method = KEY_SERVER_METHOD.clone();
    let status = KEY_SERVER_STATUS.clone();

    vec![
        View::new(
            "grpc.io/server/received_bytes_per_rpc",
            SERVER_RECEIVED_BYTES_PER_RPC.clone(),
            bytes_distribution(),
        )
        .with_description("Distribution of received bytes per RPC, by method.")
        .with_tag_keys([method.clone()]),
        View::new(
            "grpc.io/server/sent_bytes_per_rpc",
            SERVER_SENT_BYTES_PER_RPC.clone(),
            bytes_distribution(),
        )
        .with_description("Distribution of total sent bytes per RPC, by method.")
        .with_tag_keys([method.clone()]),
        View::new(
            "grpc.io/server/server_latency",
            SERVER_LATENCY.clone(),
            latency_distribution(),
        )
        .with_description("Distribution of server latency in milliseconds, by method.")
        .with_tag_keys([method.clone()]),
        View::new(
            "grpc.io/server/completed_rpcs",
            SERVER_LATENCY.clone(),
            Aggregation::Count,
        )
        .with_description("Count of RPCs by method and status.")
        .with_tag_keys([method, status]),
    ]
}

/// All default gRPC views
pub fn views() -> Vec<View> {
    let mut views = client_views();
    views.extend(server_views());
    views
}

/// Register the default gRPC views; returns the newly registered names
pub fn register_grpc_views(registry: &StatsRegistry) -> TelemetryResult<Vec<String>> {
    registry.register_views(&views())
}

/// Outcome of one RPC
#[derive(Debug, Clone)]
pub struct RpcStats<'a> {
    /// Full method name, e.g. `/pkg.Service/Method`
    pub method: &'a str,
    /// Canonical status code name, e.g. `OK`
    pub status: &'a str,
    /// Latency in milliseconds
    pub latency_ms: f64,
    /// Bytes sent
    pub sent_bytes: u64,
    /// Bytes received
    pub received_bytes: u64,
}

/// Records gRPC measurements against a telemetry handle
///
/// # Examples
///
/// ```
/// use perfscope_core::Telemetry;
/// use perfscope_views::grpc::{self, GrpcMetrics, RpcStats};
///
/// let telemetry = Telemetry::new();
/// grpc::register_grpc_views(telemetry.stats()).unwrap();
///
/// let metrics = GrpcMetrics::new(telemetry.clone());
/// metrics.record_client_rpc(&RpcStats {
///     method: "/echo.Echo/Say",
///     status: "OK",
///     latency_ms: 3.2,
///     sent_bytes: 120,
///     received_bytes: 512,
/// });
///
/// assert!(!telemetry.stats().collect().is_empty());
/// ```
#[derive(Clone)]
pub struct GrpcMetrics {
    telemetry: Telemetry,
}

impl GrpcMetrics {
    /// Create a recorder
    pub fn new(telemetry: Telemetry) -> Self {
        Self { telemetry }
    }

    /// Record a completed client call
    pub fn record_client_rpc(&self, rpc: &RpcStats<'_>) {
        let tags = TagMap::new()
            .with(&KEY_CLIENT_METHOD, rpc.method)
            .with(&KEY_CLIENT_STATUS, rpc.status);

        self.telemetry.record(
            &tags,
            &[
                CLIENT_ROUNDTRIP_LATENCY.m(rpc.latency_ms),
                CLIENT_SENT_BYTES_PER_RPC.m(rpc.sent_bytes as f64),
                CLIENT_RECEIVED_BYTES_PER_RPC.m(rpc.received_bytes as f64),
            ],
        );
    }

    /// Record a completed served call
    pub fn record_server_rpc(&self, rpc: &RpcStats<'_>) {
        let tags = TagMap::new()
            .with(&KEY_SERVER_METHOD, rpc.method)
            .with(&KEY_SERVER_STATUS, rpc.status);

        self.telemetry.record(
            &tags,
            &[
                SERVER_LATENCY.m(rpc.latency_ms),
                SERVER_SENT_BYTES_PER_RPC.m(rpc.sent_bytes as f64),
                SERVER_RECEIVED_BYTES_PER_RPC.m(rpc.received_bytes as f64),
            ],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perfscope_core::stats::CountData;

    #[test]
    fn test_views_are_valid() {
        for view in views() {
            assert!(view.validate().is_ok(), "{} is invalid", view.name);
        }
        assert_eq!(views().len(), 8);
    }

    #[test]
    fn test_register_twice_is_noop() {
        let registry = StatsRegistry::new();
        assert_eq!(register_grpc_views(&registry).unwrap().len(), 8);
        assert!(register_grpc_views(&registry).unwrap().is_empty());
    }

    #[test]
    fn test_completed_rpcs_counts_by_status() {
        let telemetry = Telemetry::new();
        register_grpc_views(telemetry.stats()).unwrap();
        let metrics = GrpcMetrics::new(telemetry.clone());

        for status in ["OK", "OK", "UNAVAILABLE"] {
            metrics.record_server_rpc(&RpcStats {
                method: "/svc/Call",
                status,
                latency_ms: 1.0,
                sent_bytes: 10,
                received_bytes: 10,
            });
        }

        let completed = telemetry
            .stats()
            .collect()
            .into_iter()
            .find(|d| d.view.name == "grpc.io/server/completed_rpcs")
            .unwrap();

        assert_eq!(completed.rows.len(), 2);
        let ok = completed
            .rows
            .iter()
            .find(|r| r.tags.iter().any(|t| t.value == "OK"))
            .unwrap();
        assert_eq!(ok.data.as_any().downcast_ref::<CountData>().unwrap().value, 2);
    }
}
