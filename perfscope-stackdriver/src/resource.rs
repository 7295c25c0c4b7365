//! Monitored resource derivation.

use crate::config::CloudEnvironment;
use crate::error::Result;
use crate::metadata::MetadataProvider;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resource type used for Cloud Run services.
///
/// Custom metrics accept only a few resource types; `gae_instance` carries
/// module and version labels that line up with a Cloud Run service and
/// revision.
pub const GAE_INSTANCE: &str = "gae_instance";

/// Resource type used when nothing more specific is known.
pub const GLOBAL: &str = "global";

/// Backend-side description of where metrics come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredResource {
    /// Resource type.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Resource labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl MonitoredResource {
    /// Resource with the given type and no labels.
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            labels: BTreeMap::new(),
        }
    }

    /// Add a label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// `gae_instance` resource.
    pub fn gae_instance(
        project_id: impl Into<String>,
        module_id: impl Into<String>,
        version_id: impl Into<String>,
        instance_id: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self::new(GAE_INSTANCE)
            .with_label("project_id", project_id)
            .with_label("module_id", module_id)
            .with_label("version_id", version_id)
            .with_label("instance_id", instance_id)
            .with_label("location", location)
    }

    /// `global` resource for a project.
    pub fn global(project_id: impl Into<String>) -> Self {
        Self::new(GLOBAL).with_label("project_id", project_id)
    }
}

/// Derive the monitored resource for this process.
///
/// Returns `None` unless `K_SERVICE` is set. On Cloud Run, zone and instance
/// id come from the environment overrides when present and from the metadata
/// server otherwise; a failed lookup is an error.
pub async fn detect_resource(
    env: &CloudEnvironment,
    metadata: &dyn MetadataProvider,
) -> Result<Option<MonitoredResource>> {
    let Some(service) = env.service.as_deref() else {
        tracing::debug!("not running on a managed serverless host, using default resource");
        return Ok(None);
    };

    let zone = match env.zone.as_deref() {
        Some(zone) => zone.to_string(),
        None => metadata.zone().await?,
    };

    let instance_id = match env.instance_id.as_deref() {
        Some(id) => id.to_string(),
        None => metadata.instance_id().await?,
    };

    let resource = MonitoredResource::gae_instance(
        env.project_id.clone().unwrap_or_default(),
        service,
        env.revision.clone().unwrap_or_default(),
        instance_id,
        zone,
    );

    tracing::info!(
        resource_type = %resource.resource_type,
        module = service,
        location = %resource.labels["location"],
        "detected monitored resource"
    );

    Ok(Some(resource))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gae_instance_labels() {
        let resource = MonitoredResource::gae_instance("proj", "api", "api-00042", "0011", "us-east1-b");

        assert_eq!(resource.resource_type, "gae_instance");
        assert_eq!(resource.labels.len(), 5);
        assert_eq!(resource.labels["module_id"], "api");
        assert_eq!(resource.labels["version_id"], "api-00042");
        assert_eq!(resource.labels["location"], "us-east1-b");
    }

    #[test]
    fn test_serializes_type_field() {
        let json = serde_json::to_value(MonitoredResource::global("proj")).unwrap();
        assert_eq!(json["type"], "global");
        assert_eq!(json["labels"]["project_id"], "proj");
    }
}
