//! The `couchbase.com/v2` `CouchbaseCluster` resource.

use async_trait::async_trait;
use const_format::concatcp;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{
    api::{ApiResource, DynamicObject, GroupVersionKind},
    core::TypeMeta,
};
use serde_json::{Value, json};
use snafu::{OptionExt, ResultExt, ensure};
use tracing::instrument;

use crate::{
    client::{self, ApplyParams, DeleteOutcome, DynamicClient},
    diagnostics::{Diagnostic, Diagnostics},
    jsonpath::JsonPath,
    resource::{
        ApplySnafu, ConditionError, DeleteSnafu, DeserializeSnafu, EncodeObjectSnafu, Error,
        FetchObjectSnafu, GetSnafu, ImportId, ImportSnafu, InvalidJsonPathSnafu,
        InvalidPlanSnafu, Metadata, ProviderData, Resource, ResourceModel, Result,
        SerializeSnafu, UnconfiguredSnafu, WaitForDeleteSnafu, WaitForUpsert, WaitForUpsertSnafu,
        wait,
    },
    schema::{
        Presence, ResourceSchema,
        convert::{from_kubernetes, to_kubernetes},
    },
};

mod manifest;
mod schema;

pub use manifest::CouchbaseClusterV2Manifest;
pub use schema::SCHEMA;

pub const GROUP: &str = "couchbase.com";
pub const VERSION: &str = "v2";
pub const KIND: &str = "CouchbaseCluster";
pub const PLURAL: &str = "couchbaseclusters";
pub const API_VERSION: &str = concatcp!(GROUP, "/", VERSION);

/// Suffix of the Terraform type name, appended to the provider type name.
const TYPE_NAME_SUFFIX: &str = "_couchbase_com_couchbase_cluster_v2";

pub fn api_resource() -> ApiResource {
    ApiResource::from_gvk_with_plural(&GroupVersionKind::gvk(GROUP, VERSION, KIND), PLURAL)
}

/// Builds the object sent to the API server from a validated plan.
fn build_object(model: &ResourceModel) -> DynamicObject {
    let mut object = DynamicObject::new(&model.metadata.name, &api_resource());
    object.metadata = ObjectMeta::from(&model.metadata);
    object.data = json!({
        "spec": to_kubernetes(SCHEMA.nested("spec"), &model.spec),
    });
    object
}

/// Validates a plan, ignoring the attributes only the provider sets.
fn validate_plan(schema: &ResourceSchema, plan: &Value) -> Result<ResourceModel> {
    let mut config = plan.clone();
    if let Value::Object(object) = &mut config {
        for attribute in &schema.attributes {
            if attribute.presence == Presence::Computed {
                object.remove(&attribute.name);
            }
        }
    }

    let diagnostics = schema.validate(&config);
    ensure!(!diagnostics.has_errors(), InvalidPlanSnafu { diagnostics });

    serde_json::from_value(plan.clone()).context(DeserializeSnafu { what: "plan" })
}

/// Maps an object returned by the API server into the state. Provider-local attributes are
/// taken from `local`.
fn to_state(object: &DynamicObject, local: ResourceModel) -> Result<Value> {
    let metadata = Metadata::from(&object.metadata);
    let (api_version, kind) = match &object.types {
        Some(TypeMeta { api_version, kind }) => (api_version.clone(), kind.clone()),
        None => (API_VERSION.to_owned(), KIND.to_owned()),
    };
    let spec = object
        .data
        .get("spec")
        .map_or(Value::Null, |spec| from_kubernetes(SCHEMA.nested("spec"), spec));

    let state = ResourceModel {
        id: Some(format!("{}/{}", metadata.namespace, metadata.name)),
        api_version: Some(api_version),
        kind: Some(kind),
        metadata,
        spec,
        ..local
    };
    serde_json::to_value(&state).context(SerializeSnafu { what: "state" })
}

/// Manages `CouchbaseCluster` objects through server-side apply.
#[derive(Debug, Default)]
pub struct CouchbaseClusterV2 {
    provider: Option<ProviderData>,
}

impl CouchbaseClusterV2 {
    pub fn new(provider: ProviderData) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    fn provider(&self) -> Result<&ProviderData> {
        self.provider.as_ref().context(UnconfiguredSnafu)
    }

    /// Shared by create and update, which both apply the full object.
    async fn apply(&self, plan: &Value) -> Result<Value> {
        let provider = self.provider()?;
        let mut model = validate_plan(&SCHEMA, plan)?;
        let id = model.object_id();

        let params = ApplyParams {
            field_manager: model
                .field_manager
                .clone()
                .unwrap_or_else(|| provider.field_manager.clone()),
            force: model.force_conflicts.unwrap_or_default(),
        };
        tracing::info!(
            field_manager = %params.field_manager,
            force = params.force,
            "applying object"
        );

        let conditions = model
            .wait_for_upsert
            .iter()
            .flatten()
            .map(|condition| {
                let jsonpath: JsonPath =
                    condition.jsonpath.parse().context(InvalidJsonPathSnafu {
                        jsonpath: &condition.jsonpath,
                    })?;
                Ok::<_, Error>((condition, jsonpath))
            })
            .collect::<Result<Vec<_>>>()?;

        let resource = api_resource();
        let applied = provider
            .client
            .apply(&resource, &build_object(&model), &params)
            .await
            .context(ApplySnafu { id: &id })?;

        wait_for_upsert(
            provider.client.as_ref(),
            &resource,
            &model.metadata,
            &conditions,
            &id,
        )
        .await?;

        model.field_manager = Some(params.field_manager);
        model.force_conflicts = Some(params.force);
        to_state(&applied, model)
    }
}

/// Polls the object until every condition holds, one condition after the other.
async fn wait_for_upsert(
    client: &dyn DynamicClient,
    resource: &ApiResource,
    metadata: &Metadata,
    conditions: &[(&WaitForUpsert, JsonPath)],
    id: &str,
) -> Result<()> {
    let Metadata {
        name, namespace, ..
    } = metadata;

    for (condition, jsonpath) in conditions {
        tracing::debug!(
            jsonpath = %condition.jsonpath,
            value = %condition.value,
            timeout = %condition.timeout,
            "waiting for condition"
        );

        wait::poll(condition.timeout, condition.poll_interval, || async {
            let Some(object) = client
                .get(resource, namespace, name)
                .await
                .context(FetchObjectSnafu)?
            else {
                tracing::warn!("object is missing, waiting for it to reappear");
                return Ok::<_, ConditionError>(false);
            };
            let document = serde_json::to_value(&object).context(EncodeObjectSnafu)?;
            let actual = jsonpath.render(&document);
            tracing::trace!(%actual, "evaluated condition");
            Ok(actual == condition.value)
        })
        .await
        .context(WaitForUpsertSnafu {
            id,
            jsonpath: &condition.jsonpath,
            value: &condition.value,
        })?;
    }

    Ok(())
}

#[async_trait]
impl Resource for CouchbaseClusterV2 {
    fn metadata(&self, provider_type_name: &str) -> String {
        format!("{provider_type_name}{TYPE_NAME_SUFFIX}")
    }

    fn schema(&self) -> &'static ResourceSchema {
        &SCHEMA
    }

    fn configure(&mut self, provider_data: Option<ProviderData>) {
        if provider_data.is_none() {
            tracing::debug!("provider is not configured yet");
        }
        self.provider = provider_data;
    }

    #[instrument(skip_all)]
    async fn create(&self, plan: &Value) -> Result<Value> {
        self.apply(plan).await
    }

    #[instrument(skip_all, fields(id))]
    async fn read(&self, state: &Value) -> Result<Option<Value>> {
        let provider = self.provider()?;
        let model: ResourceModel =
            serde_json::from_value(state.clone()).context(DeserializeSnafu { what: "state" })?;
        let id = model.object_id();
        tracing::Span::current().record("id", id.as_str());

        let object = provider
            .client
            .get(&api_resource(), &model.metadata.namespace, &model.metadata.name)
            .await
            .context(GetSnafu { id: &id })?;

        match object {
            Some(object) => to_state(&object, model).map(Some),
            None => {
                tracing::info!("object no longer exists, removing it from the state");
                Ok(None)
            }
        }
    }

    #[instrument(skip_all)]
    async fn update(&self, plan: &Value) -> Result<Value> {
        self.apply(plan).await
    }

    #[instrument(skip_all, fields(id))]
    async fn delete(&self, state: &Value) -> Result<()> {
        let provider = self.provider()?;
        let model: ResourceModel =
            serde_json::from_value(state.clone()).context(DeserializeSnafu { what: "state" })?;
        let id = model.object_id();
        tracing::Span::current().record("id", id.as_str());

        let Metadata {
            name, namespace, ..
        } = &model.metadata;
        let resource = api_resource();

        let outcome = provider
            .client
            .delete(&resource, namespace, name, model.deletion_propagation)
            .await
            .context(DeleteSnafu { id: &id })?;

        if outcome == DeleteOutcome::AlreadyGone {
            tracing::info!("object was already deleted");
            return Ok(());
        }

        if let Some(wait_for_delete) = &model.wait_for_delete {
            tracing::debug!(timeout = %wait_for_delete.timeout, "waiting for deletion");
            wait::poll(
                wait_for_delete.timeout,
                wait_for_delete.poll_interval,
                || async {
                    let object = provider.client.get(&resource, namespace, name).await?;
                    Ok::<_, client::Error>(object.is_none())
                },
            )
            .await
            .context(WaitForDeleteSnafu { id: &id })?;
        }

        Ok(())
    }

    fn import_state(&self, id: &str) -> Result<Value> {
        let id: ImportId = id.parse().context(ImportSnafu)?;
        Ok(json!({
            "id": id.to_string(),
            "metadata": {
                "namespace": id.namespace,
                "name": id.name,
            },
        }))
    }

    fn modify_plan(&self, prior: Option<&Value>, plan: &Value) -> Diagnostics {
        let Some(prior) = prior else {
            return Diagnostics::default();
        };

        SCHEMA
            .requires_replace(prior, plan)
            .into_iter()
            .map(Diagnostic::requires_replace)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use indoc::indoc;
    use k8s_provider_shared::time::Duration;

    use super::*;
    use crate::client::fake::FakeClient;

    fn plan() -> Value {
        serde_yaml::from_str(indoc! {"
            metadata:
              name: cb-example
              namespace: couchbase
              labels:
                tier: db
            spec:
              image: couchbase/server:7.6.0
              anti_affinity: true
              security:
                admin_secret: cb-example-auth
              buckets:
                managed: true
              servers:
                - name: all_services
                  size: 3
                  services: [data, index, query]
        "})
        .unwrap()
    }

    fn resource(client: &Arc<FakeClient>) -> CouchbaseClusterV2 {
        CouchbaseClusterV2::new(ProviderData::new(client.clone()))
    }

    #[test]
    fn type_name() {
        assert_eq!(
            CouchbaseClusterV2::default().metadata("k8s"),
            "k8s_couchbase_com_couchbase_cluster_v2"
        );
    }

    #[test]
    fn addresses_couchbase_clusters() {
        let resource = api_resource();
        assert_eq!(resource.group, "couchbase.com");
        assert_eq!(resource.version, "v2");
        assert_eq!(resource.api_version, API_VERSION);
        assert_eq!(resource.kind, "CouchbaseCluster");
        assert_eq!(resource.plural, "couchbaseclusters");
    }

    #[tokio::test]
    async fn create_applies_object() {
        let client = Arc::new(FakeClient::new());
        let state = resource(&client).create(&plan()).await.unwrap();

        let applies = client.applies();
        assert_eq!(applies.len(), 1);
        let applied = &applies[0];
        assert_eq!(applied.api_resource.plural, PLURAL);
        assert_eq!(
            applied.params,
            ApplyParams {
                field_manager: "terraform-provider-k8s".to_owned(),
                force: false,
            }
        );

        let object = serde_json::to_value(&applied.object).unwrap();
        assert_eq!(object["apiVersion"], "couchbase.com/v2");
        assert_eq!(object["kind"], "CouchbaseCluster");
        assert_eq!(object["metadata"]["labels"]["tier"], "db");
        assert_eq!(object["spec"]["antiAffinity"], true);
        assert_eq!(object["spec"]["security"]["adminSecret"], "cb-example-auth");
        assert_eq!(object["spec"]["servers"][0]["services"], json!(["data", "index", "query"]));

        assert_eq!(state["id"], "couchbase/cb-example");
        assert_eq!(state["api_version"], "couchbase.com/v2");
        assert_eq!(state["kind"], "CouchbaseCluster");
        assert_eq!(state["field_manager"], "terraform-provider-k8s");
        assert_eq!(state["force_conflicts"], false);
        assert_eq!(state["spec"], plan()["spec"]);
    }

    #[tokio::test]
    async fn create_uses_configured_field_manager() {
        let client = Arc::new(FakeClient::new());
        let resource = CouchbaseClusterV2::new(
            ProviderData::new(client.clone()).with_field_manager("platform-team"),
        );

        let mut plan = plan();
        plan["force_conflicts"] = json!(true);
        resource.create(&plan).await.unwrap();

        plan["field_manager"] = json!("cluster-admin");
        let state = resource.update(&plan).await.unwrap();

        let params = client
            .applies()
            .into_iter()
            .map(|applied| applied.params)
            .collect::<Vec<_>>();
        assert_eq!(
            params,
            [
                ApplyParams {
                    field_manager: "platform-team".to_owned(),
                    force: true,
                },
                ApplyParams {
                    field_manager: "cluster-admin".to_owned(),
                    force: true,
                },
            ]
        );
        assert_eq!(state["field_manager"], "cluster-admin");
    }

    #[tokio::test]
    async fn drops_server_defaults_from_state() {
        let client = Arc::new(
            FakeClient::new()
                .with_server_default("upgradeStrategy", json!("RollingUpgrade"))
                .with_server_default("autoscaleStabilizationPeriod", json!("0s"))
                .with_server_default("undeclaredField", json!({"a": 1})),
        );
        let resource = resource(&client);

        let state = resource.create(&plan()).await.unwrap();
        assert_eq!(state["spec"]["upgrade_strategy"], "RollingUpgrade");
        assert_eq!(state["spec"]["autoscale_stabilization_period"], "0s");
        assert!(state["spec"].get("undeclared_field").is_none());
        assert!(state["spec"].get("undeclaredField").is_none());

        let read = resource.read(&state).await.unwrap().unwrap();
        assert_eq!(read, state);
    }

    #[tokio::test]
    async fn read_missing_object() {
        let client = Arc::new(FakeClient::new());
        let state = json!({
            "id": "couchbase/cb-example",
            "metadata": {"name": "cb-example", "namespace": "couchbase"},
        });

        assert_eq!(resource(&client).read(&state).await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_waits_until_gone() {
        let client = Arc::new(FakeClient::new().keep_after_delete(3));
        let resource = resource(&client);

        let mut plan = plan();
        plan["deletion_propagation"] = json!("Foreground");
        plan["wait_for_delete"] = json!({"timeout": "5s", "poll_interval": "1ms"});
        let state = resource.create(&plan).await.unwrap();

        resource.delete(&state).await.unwrap();

        assert_eq!(
            client.deletes()[0].propagation,
            Some(crate::resource::DeletionPropagation::Foreground)
        );
        assert_eq!(client.gets(), 4);
        assert!(client.object(&api_resource(), "couchbase", "cb-example").is_none());
    }

    #[tokio::test]
    async fn delete_times_out() {
        let client = Arc::new(FakeClient::new().keep_after_delete(usize::MAX));
        let resource = resource(&client);

        let mut plan = plan();
        plan["wait_for_delete"] = json!({"timeout": "20ms", "poll_interval": "5ms"});
        let state = resource.create(&plan).await.unwrap();

        let error = resource.delete(&state).await.unwrap_err();
        assert!(matches!(error, Error::WaitForDelete { .. }));
        assert_eq!(error.summary(), "Timed out waiting for deletion");
    }

    #[tokio::test]
    async fn delete_missing_object_succeeds() {
        let client = Arc::new(FakeClient::new());
        let state = json!({
            "metadata": {"name": "cb-example", "namespace": "couchbase"},
            "wait_for_delete": {"timeout": "1s"},
        });

        resource(&client).delete(&state).await.unwrap();
        assert_eq!(client.gets(), 0);
    }

    #[tokio::test]
    async fn waits_for_upsert_condition() {
        let client = Arc::new(FakeClient::new());
        let resource = resource(&client);

        let mut plan = plan();
        plan["wait_for_upsert"] = json!([{
            "jsonpath": "{.status.conditions[?(@.type==\"Available\")].status}",
            "value": "True",
            "timeout": "50ms",
            "poll_interval": "5ms",
        }]);

        let error = resource.create(&plan).await.unwrap_err();
        assert_eq!(error.summary(), "Timed out waiting for condition");

        client.set_status(
            &api_resource(),
            "couchbase",
            "cb-example",
            json!({"conditions": [{"type": "Available", "status": "True"}]}),
        );
        resource.update(&plan).await.unwrap();
    }

    /// Accepts applies but fails every get.
    struct FailingGetClient;

    #[async_trait]
    impl DynamicClient for FailingGetClient {
        async fn apply(
            &self,
            _resource: &ApiResource,
            object: &DynamicObject,
            _params: &ApplyParams,
        ) -> client::Result<DynamicObject> {
            Ok(object.clone())
        }

        async fn get(
            &self,
            _resource: &ApiResource,
            _namespace: &str,
            _name: &str,
        ) -> client::Result<Option<DynamicObject>> {
            Err(client::Error::MissingObjectKey { field: "name" })
        }

        async fn delete(
            &self,
            _resource: &ApiResource,
            _namespace: &str,
            _name: &str,
            _propagation: Option<crate::resource::DeletionPropagation>,
        ) -> client::Result<DeleteOutcome> {
            Ok(DeleteOutcome::Deleted)
        }
    }

    #[tokio::test]
    async fn reports_failing_condition_checks() {
        let resource = CouchbaseClusterV2::new(ProviderData::new(Arc::new(FailingGetClient)));

        let mut plan = plan();
        plan["wait_for_upsert"] = json!([{
            "jsonpath": "{.status.phase}",
            "value": "Running",
            "timeout": "1s",
            "poll_interval": "5ms",
        }]);

        let error = resource.create(&plan).await.unwrap_err();
        assert!(matches!(
            error,
            Error::WaitForUpsert {
                source: wait::PollError::Check {
                    source: ConditionError::FetchObject { .. }
                },
                ..
            }
        ));
        assert_eq!(error.summary(), "Error waiting for condition");
        assert!(error.detail().contains("failed to fetch the object"));
    }

    #[tokio::test]
    async fn rejects_invalid_wait_condition() {
        let client = Arc::new(FakeClient::new());
        let mut plan = plan();
        plan["wait_for_upsert"] = json!([{"jsonpath": "{..status}", "value": "x"}]);

        let error = resource(&client).create(&plan).await.unwrap_err();
        assert!(matches!(error, Error::InvalidJsonPath { .. }));
        assert!(client.applies().is_empty());
    }

    #[tokio::test]
    async fn rejects_invalid_plan_before_applying() {
        let client = Arc::new(FakeClient::new());
        let mut plan = plan();
        plan["spec"]["platform"] = json!("openstack");
        plan["spec"]["servers"][0]["size"] = json!(-3);

        let error = resource(&client).create(&plan).await.unwrap_err();
        let diagnostics = error.diagnostics();
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics.at("spec.platform").count(), 1);
        assert_eq!(diagnostics.at("spec.servers[0].size").count(), 1);
        assert!(client.applies().is_empty());
    }

    #[tokio::test]
    async fn update_accepts_computed_attributes_from_state() {
        let client = Arc::new(FakeClient::new());
        let resource = resource(&client);

        let state = resource.create(&plan()).await.unwrap();
        let mut plan = state.clone();
        plan["spec"]["image"] = json!("couchbase/server:7.6.1");

        let state = resource.update(&plan).await.unwrap();
        assert_eq!(state["spec"]["image"], "couchbase/server:7.6.1");
        assert_eq!(
            client
                .object(&api_resource(), "couchbase", "cb-example")
                .unwrap()
                .metadata
                .generation,
            Some(2)
        );
    }

    #[tokio::test]
    async fn unconfigured_resource_fails() {
        let resource = CouchbaseClusterV2::default();
        let error = resource.create(&plan()).await.unwrap_err();

        assert!(matches!(error, Error::Unconfigured));
        assert_eq!(error.summary(), "Unconfigured provider");
    }

    #[tokio::test]
    async fn import_then_read() {
        let client = Arc::new(FakeClient::new());
        let resource = resource(&client);
        resource.create(&plan()).await.unwrap();

        let imported = resource.import_state("couchbase/cb-example").unwrap();
        assert_eq!(
            imported,
            json!({
                "id": "couchbase/cb-example",
                "metadata": {"namespace": "couchbase", "name": "cb-example"},
            })
        );

        let state = resource.read(&imported).await.unwrap().unwrap();
        assert_eq!(state["spec"]["image"], "couchbase/server:7.6.0");
    }

    #[test]
    fn import_rejects_malformed_id() {
        let error = CouchbaseClusterV2::default()
            .import_state("cb-example")
            .unwrap_err();
        assert_eq!(error.summary(), "Error importing resource");
    }

    #[test]
    fn renaming_requires_replacement() {
        let resource = CouchbaseClusterV2::default();
        let prior = plan();
        let mut planned = plan();
        planned["metadata"]["name"] = json!("cb-renamed");
        planned["spec"]["image"] = json!("couchbase/server:7.6.1");

        assert!(resource.modify_plan(None, &planned).is_empty());

        let diagnostics = resource.modify_plan(Some(&prior), &planned);
        assert_eq!(diagnostics.len(), 1);
        let diagnostic = diagnostics.iter().next().unwrap();
        assert_eq!(diagnostic.summary, "Resource requires replacement");
        assert_eq!(
            diagnostic.path.as_ref().map(ToString::to_string).as_deref(),
            Some("metadata.name")
        );
    }

    #[test]
    fn wait_defaults() {
        let model: ResourceModel = serde_json::from_value(json!({
            "metadata": {"name": "cb-example", "namespace": "couchbase"},
            "wait_for_delete": {},
        }))
        .unwrap();
        let wait_for_delete = model.wait_for_delete.unwrap();
        assert_eq!(wait_for_delete.timeout, Duration::from_secs(30));
        assert_eq!(wait_for_delete.poll_interval, Duration::from_secs(5));
    }
}
