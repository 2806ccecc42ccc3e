use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_provider_shared::time::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_FIELD_MANAGER: &str = "terraform-provider-k8s";
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

const fn default_wait_timeout() -> Duration {
    DEFAULT_WAIT_TIMEOUT
}

const fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

/// Maps onto the Kubernetes `propagationPolicy` of delete requests.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, strum::Display, strum::EnumString,
)]
pub enum DeletionPropagation {
    /// Orphan the dependents.
    Orphan,

    /// Delete the dependents in the foreground, before the object itself is gone.
    Foreground,

    /// Delete the dependents in the background.
    Background,
}

/// A condition which must hold after an object was created or updated.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct WaitForUpsert {
    /// Evaluated against the object returned by the API server, e.g. `{.status.phase}`.
    pub jsonpath: String,

    /// The rendered JSONPath result the condition waits for.
    pub value: String,

    #[serde(default = "default_wait_timeout")]
    pub timeout: Duration,

    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,
}

/// Wait until a deleted object is gone.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct WaitForDelete {
    #[serde(default = "default_wait_timeout")]
    pub timeout: Duration,

    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,
}

impl Default for WaitForDelete {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_WAIT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Metadata {
    pub name: String,
    pub namespace: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl From<&Metadata> for ObjectMeta {
    fn from(metadata: &Metadata) -> Self {
        let non_empty = |map: &BTreeMap<String, String>| (!map.is_empty()).then(|| map.clone());

        Self {
            name: Some(metadata.name.clone()),
            namespace: Some(metadata.namespace.clone()),
            labels: non_empty(&metadata.labels),
            annotations: non_empty(&metadata.annotations),
            ..Self::default()
        }
    }
}

impl From<&ObjectMeta> for Metadata {
    fn from(meta: &ObjectMeta) -> Self {
        Self {
            name: meta.name.clone().unwrap_or_default(),
            namespace: meta.namespace.clone().unwrap_or_default(),
            labels: meta.labels.clone().unwrap_or_default(),
            annotations: meta.annotations.clone().unwrap_or_default(),
        }
    }
}

/// Plan and state of a custom resource.
///
/// The provider-local attributes are typed, the resource-specific `spec` is kept as a
/// Terraform-shaped value and converted through the resource schema.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResourceModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_conflicts: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_manager: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_propagation: Option<DeletionPropagation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for_upsert: Option<Vec<WaitForUpsert>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for_delete: Option<WaitForDelete>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    pub metadata: Metadata,

    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub spec: Value,
}

impl ResourceModel {
    /// The identifier of the managed object, `<namespace>/<name>`.
    pub fn object_id(&self) -> String {
        format!("{}/{}", self.metadata.namespace, self.metadata.name)
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn deserializes_plan_with_defaults() {
        let plan: ResourceModel = serde_yaml::from_str(indoc! {"
            deletion_propagation: Foreground
            wait_for_upsert:
              - jsonpath: '{.status.phase}'
                value: Running
                timeout: 5m
            wait_for_delete: {}
            metadata:
              name: cb-example
              namespace: couchbase
              labels:
                tier: db
            spec:
              image: couchbase/server:7.6.0
        "})
        .unwrap();

        assert_eq!(plan.deletion_propagation, Some(DeletionPropagation::Foreground));
        assert_eq!(
            plan.wait_for_upsert,
            Some(vec![WaitForUpsert {
                jsonpath: "{.status.phase}".to_owned(),
                value: "Running".to_owned(),
                timeout: Duration::from_secs(300),
                poll_interval: DEFAULT_POLL_INTERVAL,
            }])
        );
        assert_eq!(plan.wait_for_delete, Some(WaitForDelete::default()));
        assert_eq!(plan.object_id(), "couchbase/cb-example");
        assert_eq!(plan.spec["image"], "couchbase/server:7.6.0");
    }

    #[test]
    fn metadata_round_trips_through_object_meta() {
        let metadata = Metadata {
            name: "cb-example".to_owned(),
            namespace: "couchbase".to_owned(),
            labels: [("tier".to_owned(), "db".to_owned())].into(),
            annotations: BTreeMap::new(),
        };

        let object_meta = ObjectMeta::from(&metadata);
        assert_eq!(object_meta.annotations, None);
        assert_eq!(Metadata::from(&object_meta), metadata);
    }

    #[test]
    fn serializes_without_unset_attributes() {
        let model = ResourceModel {
            id: Some("couchbase/cb-example".to_owned()),
            metadata: Metadata {
                name: "cb-example".to_owned(),
                namespace: "couchbase".to_owned(),
                ..Metadata::default()
            },
            ..ResourceModel::default()
        };

        assert_eq!(
            serde_json::to_value(&model).unwrap(),
            serde_json::json!({
                "id": "couchbase/cb-example",
                "metadata": {"name": "cb-example", "namespace": "couchbase"},
            })
        );
    }
}
