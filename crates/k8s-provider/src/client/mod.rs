//! Access to custom resources through the Kubernetes API.
//!
//! The [`DynamicClient`] trait covers the three verbs needed to manage an object: server-side
//! apply, get and delete. [`Client`] implements it on top of a [`kube::Client`], working with
//! untyped [`DynamicObject`]s addressed by an [`ApiResource`].

use async_trait::async_trait;
use kube::{
    Api,
    api::{ApiResource, DeleteParams, DynamicObject, Patch, PatchParams, PropagationPolicy},
};
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::instrument;

use crate::resource::DeletionPropagation;

#[cfg(test)]
pub mod fake;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to apply {kind} {namespace}/{name}"))]
    Apply {
        source: kube::Error,
        kind: String,
        namespace: String,
        name: String,
    },

    #[snafu(display("failed to get {kind} {namespace}/{name}"))]
    Get {
        source: kube::Error,
        kind: String,
        namespace: String,
        name: String,
    },

    #[snafu(display("failed to delete {kind} {namespace}/{name}"))]
    Delete {
        source: kube::Error,
        kind: String,
        namespace: String,
        name: String,
    },

    #[snafu(display("object has no {field}"))]
    MissingObjectKey { field: &'static str },
}

/// Server-side apply options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplyParams {
    pub field_manager: String,

    /// Take ownership of fields managed by other field managers instead of failing with a
    /// conflict.
    pub force: bool,
}

impl From<&ApplyParams> for PatchParams {
    fn from(params: &ApplyParams) -> Self {
        let patch_params = Self::apply(&params.field_manager);
        if params.force {
            patch_params.force()
        } else {
            patch_params
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The deletion was accepted. The object may still exist until its finalizers ran.
    Deleted,

    /// There was nothing to delete.
    AlreadyGone,
}

impl From<DeletionPropagation> for PropagationPolicy {
    fn from(propagation: DeletionPropagation) -> Self {
        match propagation {
            DeletionPropagation::Orphan => Self::Orphan,
            DeletionPropagation::Foreground => Self::Foreground,
            DeletionPropagation::Background => Self::Background,
        }
    }
}

/// Manages namespaced objects of arbitrary resource types.
#[async_trait]
pub trait DynamicClient: Send + Sync {
    /// Creates or updates `object` using server-side apply and returns the object as stored by
    /// the API server.
    async fn apply(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
        params: &ApplyParams,
    ) -> Result<DynamicObject>;

    /// Returns [`None`] if the object does not exist.
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>>;

    async fn delete(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
        propagation: Option<DeletionPropagation>,
    ) -> Result<DeleteOutcome>;
}

/// Returns the namespace and name of `object`, which must both be set.
pub fn object_key(object: &DynamicObject) -> Result<(&str, &str)> {
    let namespace = object
        .metadata
        .namespace
        .as_deref()
        .context(MissingObjectKeySnafu { field: "namespace" })?;
    let name = object
        .metadata
        .name
        .as_deref()
        .context(MissingObjectKeySnafu { field: "name" })?;
    Ok((namespace, name))
}

/// This `Client` can be used to access Kubernetes.
/// It wraps an underlying [`kube::Client`] and works with [`DynamicObject`]s of any resource type.
#[derive(Clone)]
pub struct Client {
    client: kube::Client,
}

impl Client {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    pub fn get_namespaced_api(
        &self,
        resource: &ApiResource,
        namespace: &str,
    ) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, resource)
    }
}

#[async_trait]
impl DynamicClient for Client {
    #[instrument(skip(self, resource, object, params), fields(kind = %resource.kind))]
    async fn apply(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
        params: &ApplyParams,
    ) -> Result<DynamicObject> {
        let (namespace, name) = object_key(object)?;
        tracing::debug!(
            namespace,
            name,
            field_manager = %params.field_manager,
            force = params.force,
            "applying object"
        );

        self.get_namespaced_api(resource, namespace)
            .patch(name, &params.into(), &Patch::Apply(object))
            .await
            .with_context(|_| ApplySnafu {
                kind: &resource.kind,
                namespace,
                name,
            })
    }

    #[instrument(skip(self, resource), fields(kind = %resource.kind))]
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>> {
        self.get_namespaced_api(resource, namespace)
            .get_opt(name)
            .await
            .with_context(|_| GetSnafu {
                kind: &resource.kind,
                namespace,
                name,
            })
    }

    #[instrument(skip(self, resource), fields(kind = %resource.kind))]
    async fn delete(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
        propagation: Option<DeletionPropagation>,
    ) -> Result<DeleteOutcome> {
        let delete_params = DeleteParams {
            propagation_policy: propagation.map(Into::into),
            ..DeleteParams::default()
        };

        match self
            .get_namespaced_api(resource, namespace)
            .delete(name, &delete_params)
            .await
        {
            Ok(_) => Ok(DeleteOutcome::Deleted),
            Err(kube::Error::Api(response)) if response.code == 404 => {
                tracing::debug!("object was already deleted");
                Ok(DeleteOutcome::AlreadyGone)
            }
            Err(source) => Err(source).with_context(|_| DeleteSnafu {
                kind: &resource.kind,
                namespace,
                name,
            }),
        }
    }
}
