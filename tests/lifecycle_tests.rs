//! Exporter lifecycle through the facade.

use perfscope::prelude::*;
use perfscope::stackdriver::{CloudExporter, CloudExporterOptions, HttpMonitoringClient};
use std::sync::Arc;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_development_exporter_round_trip() {
    let telemetry = Telemetry::new();
    let mut exporter = perfscope::new_development_exporter(telemetry.clone());

    assert_eq!(exporter.state(), LifecycleState::Created);
    exporter.start().await.unwrap();
    assert_eq!(exporter.state(), LifecycleState::Started);
    assert_eq!(telemetry.stats().view_names().len(), 18);

    HttpMetrics::new(telemetry.clone()).record_request("GET", "/", 200, 4.0, 0, 12);

    exporter.stop().await;
    assert_eq!(exporter.state(), LifecycleState::Stopped);
    assert!(telemetry.stats().view_names().is_empty());
    assert_eq!(telemetry.stats().exporter_count(), 0);
    assert_eq!(telemetry.trace().exporter_count(), 0);
}

#[tokio::test]
async fn test_exporter_cannot_restart() {
    let mut exporter = perfscope::new_development_exporter(Telemetry::new());

    exporter.start().await.unwrap();
    assert!(matches!(
        exporter.start().await,
        Err(TelemetryError::InvalidState { .. })
    ));

    exporter.stop().await;
    assert!(exporter.start().await.is_err());
}

#[tokio::test]
async fn test_exporters_share_one_registry_in_turn() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;

    let telemetry = Telemetry::new();
    let original = telemetry.trace().config();

    let mut development = perfscope::new_development_exporter(telemetry.clone());
    development.start().await.unwrap();
    development.stop().await;

    let options = CloudExporterOptions::builder()
        .project_id("proj")
        .monitoring_endpoint(server.uri())
        .trace_endpoint(server.uri())
        .build()
        .unwrap();
    let client = HttpMonitoringClient::with_token_provider(&options, None).unwrap();
    let mut cloud: Box<dyn Exporter> =
        Box::new(CloudExporter::new(telemetry.clone(), options, Arc::new(client)).unwrap());

    cloud.start().await.unwrap();
    GrpcMetrics::new(telemetry.clone()).record_client_rpc(&perfscope::views::RpcStats {
        method: "helloworld.Greeter/SayHello",
        status: "OK",
        latency_ms: 2.5,
        sent_bytes: 10,
        received_bytes: 20,
    });
    telemetry.start_span("SayHello", SpanKind::Client).end();
    cloud.stop().await;

    assert!(telemetry.stats().view_names().is_empty());
    assert_eq!(telemetry.trace().config(), original);

    let requests = server.received_requests().await.unwrap();
    let paths: Vec<_> = requests.iter().map(|r| r.url.path().to_string()).collect();
    assert!(paths.contains(&"/v3/projects/proj/timeSeries".to_string()));
    assert!(paths.contains(&"/v2/projects/proj/traces:batchWrite".to_string()));
}
