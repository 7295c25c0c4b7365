//! Monitored resource derivation against fake and mocked metadata servers.

use async_trait::async_trait;
use perfscope_stackdriver::{
    CloudEnvironment, CloudExporterOptions, GceMetadataClient, MetadataProvider, StackdriverError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct FakeMetadata {
    calls: AtomicUsize,
    fail: bool,
}

impl FakeMetadata {
    fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    fn lookup(&self, value: &str) -> perfscope_stackdriver::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(StackdriverError::Metadata("metadata server unreachable".into()))
        } else {
            Ok(value.to_string())
        }
    }
}

#[async_trait]
impl MetadataProvider for FakeMetadata {
    async fn zone(&self) -> perfscope_stackdriver::Result<String> {
        self.lookup("us-central1-f")
    }

    async fn instance_id(&self) -> perfscope_stackdriver::Result<String> {
        self.lookup("4711")
    }

    async fn project_id(&self) -> perfscope_stackdriver::Result<String> {
        self.lookup("metadata-project")
    }
}

fn cloud_run_env() -> CloudEnvironment {
    CloudEnvironment {
        project_id: Some("proj".into()),
        service: Some("api".into()),
        revision: Some("api-00007".into()),
        zone: None,
        instance_id: None,
    }
}

#[tokio::test]
async fn test_no_marker_means_no_custom_resource() {
    let metadata = FakeMetadata::failing();
    let env = CloudEnvironment {
        project_id: Some("proj".into()),
        ..Default::default()
    };

    let options = CloudExporterOptions::for_environment(&env, &metadata)
        .await
        .unwrap();

    assert!(options.monitored_resource.is_none());
    assert!(options.default_labels.is_none());
    assert_eq!(options.project_id.as_deref(), Some("proj"));
    assert_eq!(metadata.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_overrides_used_verbatim() {
    let metadata = FakeMetadata::failing();
    let env = CloudEnvironment {
        zone: Some("local-zone".into()),
        instance_id: Some("local-instance".into()),
        ..cloud_run_env()
    };

    let options = CloudExporterOptions::for_environment(&env, &metadata)
        .await
        .unwrap();
    let resource = options.monitored_resource.unwrap();

    assert_eq!(resource.resource_type, "gae_instance");
    assert_eq!(resource.labels["location"], "local-zone");
    assert_eq!(resource.labels["instance_id"], "local-instance");
    assert_eq!(resource.labels["project_id"], "proj");
    assert_eq!(resource.labels["module_id"], "api");
    assert_eq!(resource.labels["version_id"], "api-00007");
    assert_eq!(options.default_labels, Some(Default::default()));
    assert_eq!(metadata.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_metadata_used_without_overrides() {
    let metadata = FakeMetadata::default();

    let options = CloudExporterOptions::for_environment(&cloud_run_env(), &metadata)
        .await
        .unwrap();
    let resource = options.monitored_resource.unwrap();

    assert_eq!(resource.labels["location"], "us-central1-f");
    assert_eq!(resource.labels["instance_id"], "4711");
    assert_eq!(metadata.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_metadata_failure_aborts() {
    let metadata = FakeMetadata::failing();
    let env = CloudEnvironment {
        zone: Some("local-zone".into()),
        ..cloud_run_env()
    };

    let result = CloudExporterOptions::for_environment(&env, &metadata).await;
    assert!(matches!(result, Err(StackdriverError::Metadata(_))));
}

#[tokio::test]
async fn test_gce_metadata_client() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/computeMetadata/v1/instance/zone"))
        .and(header("Metadata-Flavor", "Google"))
        .respond_with(ResponseTemplate::new(200).set_body_string("projects/123456/zones/europe-west4-a"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/computeMetadata/v1/instance/id"))
        .and(header("Metadata-Flavor", "Google"))
        .respond_with(ResponseTemplate::new(200).set_body_string("00bf4bf02d\n"))
        .mount(&server)
        .await;

    let client = GceMetadataClient::with_base_url(format!("{}/computeMetadata/v1", server.uri())).unwrap();

    assert_eq!(client.zone().await.unwrap(), "europe-west4-a");
    assert_eq!(client.instance_id().await.unwrap(), "00bf4bf02d");

    // Not mocked: the server answers 404
    assert!(matches!(
        client.project_id().await,
        Err(StackdriverError::Metadata(_))
    ));
}

#[tokio::test]
async fn test_gce_metadata_drives_resource() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/computeMetadata/v1/instance/zone"))
        .respond_with(ResponseTemplate::new(200).set_body_string("projects/1/zones/asia-east1-c"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/computeMetadata/v1/instance/id"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = GceMetadataClient::with_base_url(format!("{}/computeMetadata/v1", server.uri())).unwrap();

    let result = CloudExporterOptions::for_environment(&cloud_run_env(), &client).await;
    assert!(matches!(result, Err(StackdriverError::Metadata(_))));

    let env = CloudEnvironment {
        instance_id: Some("fixed".into()),
        ..cloud_run_env()
    };
    let options = CloudExporterOptions::for_environment(&env, &client).await.unwrap();
    assert_eq!(options.monitored_resource.unwrap().labels["location"], "asia-east1-c");
}
