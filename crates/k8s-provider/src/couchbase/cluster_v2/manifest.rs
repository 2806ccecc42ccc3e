//! Renders a `CouchbaseCluster` as a Kubernetes manifest without contacting the cluster.

use std::sync::LazyLock;

use k8s_provider_shared::yaml::{self, SerializeOptions};
use serde_json::{Value, json};
use snafu::ResultExt;
use tracing::instrument;

use super::{SCHEMA, TYPE_NAME_SUFFIX, build_object, validate_plan};
use crate::{
    resource::{DataSource, RenderManifestSnafu, Result},
    schema::{Attribute, AttributeType, ResourceSchema},
};

pub static MANIFEST_SCHEMA: LazyLock<ResourceSchema> = LazyLock::new(|| {
    let mut attributes = vec![
        Attribute::local("id", AttributeType::String)
            .computed()
            .description("The identifier of the rendered object, '<namespace>/<name>'."),
        Attribute::local("yaml", AttributeType::String)
            .computed()
            .description("The object as a YAML manifest, ready for 'kubectl apply'."),
    ];
    attributes.extend(
        SCHEMA
            .attributes
            .iter()
            .filter(|attribute| !attribute.is_local())
            .cloned(),
    );

    ResourceSchema {
        description: "Renders a CouchbaseCluster as a YAML manifest.".to_owned(),
        version: 0,
        attributes,
    }
});

#[derive(Debug, Default)]
pub struct CouchbaseClusterV2Manifest;

impl DataSource for CouchbaseClusterV2Manifest {
    fn metadata(&self, provider_type_name: &str) -> String {
        format!("{provider_type_name}{TYPE_NAME_SUFFIX}_manifest")
    }

    fn schema(&self) -> &'static ResourceSchema {
        &MANIFEST_SCHEMA
    }

    #[instrument(skip_all)]
    fn read(&self, config: &Value) -> Result<Value> {
        let model = validate_plan(&MANIFEST_SCHEMA, config)?;
        let id = model.object_id();

        let yaml = yaml::to_string(&build_object(&model), SerializeOptions::default())
            .context(RenderManifestSnafu { id: &id })?;

        let mut state = config.clone();
        if let Value::Object(object) = &mut state {
            object.insert("id".to_owned(), json!(id));
            object.insert("yaml".to_owned(), json!(yaml));
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    fn config() -> Value {
        serde_yaml::from_str(indoc! {"
            metadata:
              name: cb-example
              namespace: couchbase
            spec:
              image: couchbase/server:7.6.0
              security:
                admin_secret: cb-example-auth
              servers:
                - name: all_services
                  size: 3
                  services: [data]
        "})
        .unwrap()
    }

    #[test]
    fn type_name() {
        assert_eq!(
            CouchbaseClusterV2Manifest.metadata("k8s"),
            "k8s_couchbase_com_couchbase_cluster_v2_manifest"
        );
    }

    #[test]
    fn renders_manifest() {
        let state = CouchbaseClusterV2Manifest.read(&config()).unwrap();
        assert_eq!(state["id"], "couchbase/cb-example");

        let yaml = state["yaml"].as_str().unwrap();
        assert!(yaml.starts_with("---\napiVersion: couchbase.com/v2\nkind: CouchbaseCluster\n"));

        let manifest: Value = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            manifest,
            json!({
                "apiVersion": "couchbase.com/v2",
                "kind": "CouchbaseCluster",
                "metadata": {"name": "cb-example", "namespace": "couchbase"},
                "spec": {
                    "image": "couchbase/server:7.6.0",
                    "security": {"adminSecret": "cb-example-auth"},
                    "servers": [{"name": "all_services", "size": 3, "services": ["data"]}],
                },
            })
        );
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = config();
        config["spec"]["servers"] = Value::Null;

        let error = CouchbaseClusterV2Manifest.read(&config).unwrap_err();
        let diagnostics = error.diagnostics();
        assert_eq!(diagnostics.at("spec.servers").count(), 1);
    }

    #[test]
    fn has_no_provider_local_inputs() {
        assert!(MANIFEST_SCHEMA.attribute("wait_for_delete").is_none());
        assert!(MANIFEST_SCHEMA.attribute("spec").is_some());
    }
}
