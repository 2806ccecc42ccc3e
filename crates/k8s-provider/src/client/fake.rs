//! In-memory [`DynamicClient`] for exercising resources without a cluster.

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use kube::{
    api::{ApiResource, DynamicObject},
    core::TypeMeta,
};
use serde_json::Value;

use crate::{
    client::{ApplyParams, DeleteOutcome, DynamicClient, Result, object_key},
    resource::DeletionPropagation,
};

/// `(group/plural, namespace, name)`
type ObjectKey = (String, String, String);

fn key(resource: &ApiResource, namespace: &str, name: &str) -> ObjectKey {
    (
        format!("{}/{}", resource.group, resource.plural),
        namespace.to_owned(),
        name.to_owned(),
    )
}

#[derive(Clone, Debug)]
pub struct AppliedObject {
    pub api_resource: ApiResource,
    pub params: ApplyParams,
    pub object: DynamicObject,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeletedObject {
    pub namespace: String,
    pub name: String,
    pub propagation: Option<DeletionPropagation>,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<ObjectKey, DynamicObject>,

    /// Deleted objects which are still returned by the given number of gets.
    terminating: BTreeMap<ObjectKey, usize>,

    applies: Vec<AppliedObject>,
    deletes: Vec<DeletedObject>,
    gets: usize,
}

#[derive(Default)]
pub struct FakeClient {
    state: Mutex<State>,

    /// Number of gets a deleted object survives, simulating finalizers.
    keep_after_delete: usize,

    /// Spec fields the "server" adds to every applied object, unless set.
    server_defaults: BTreeMap<String, Value>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keep_after_delete(mut self, polls: usize) -> Self {
        self.keep_after_delete = polls;
        self
    }

    pub fn with_server_default(mut self, field: &str, value: Value) -> Self {
        self.server_defaults.insert(field.to_owned(), value);
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("fake client state must not be poisoned")
    }

    /// Sets the status of a stored object, as an operator would.
    pub fn set_status(&self, resource: &ApiResource, namespace: &str, name: &str, status: Value) {
        let mut state = self.state();
        let object = state
            .objects
            .get_mut(&key(resource, namespace, name))
            .expect("object to update must exist");
        object.data["status"] = status;
    }

    pub fn object(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Option<DynamicObject> {
        self.state()
            .objects
            .get(&key(resource, namespace, name))
            .cloned()
    }

    pub fn applies(&self) -> Vec<AppliedObject> {
        self.state().applies.clone()
    }

    pub fn deletes(&self) -> Vec<DeletedObject> {
        self.state().deletes.clone()
    }

    pub fn gets(&self) -> usize {
        self.state().gets
    }
}

#[async_trait]
impl DynamicClient for FakeClient {
    async fn apply(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
        params: &ApplyParams,
    ) -> Result<DynamicObject> {
        let (namespace, name) = object_key(object)?;
        let key = key(resource, namespace, name);
        let mut state = self.state();

        state.applies.push(AppliedObject {
            api_resource: resource.clone(),
            params: params.clone(),
            object: object.clone(),
        });

        let mut stored = object.clone();
        stored.types = Some(TypeMeta {
            api_version: resource.api_version.clone(),
            kind: resource.kind.clone(),
        });

        if let Some(spec) = stored.data.get_mut("spec").and_then(Value::as_object_mut) {
            for (field, value) in &self.server_defaults {
                spec.entry(field.clone()).or_insert_with(|| value.clone());
            }
        }

        let generation = match state.objects.get(&key) {
            Some(existing) => {
                if let Some(status) = existing.data.get("status") {
                    stored.data["status"] = status.clone();
                }
                stored.metadata.uid.clone_from(&existing.metadata.uid);
                existing.metadata.generation.unwrap_or_default() + 1
            }
            None => {
                stored.metadata.uid = Some(format!("uid-{namespace}-{name}"));
                1
            }
        };
        stored.metadata.generation = Some(generation);

        state.objects.insert(key, stored.clone());
        Ok(stored)
    }

    async fn get(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>> {
        let key = key(resource, namespace, name);
        let mut state = self.state();
        state.gets += 1;

        match state.terminating.get(&key).copied() {
            Some(0) => {
                state.terminating.remove(&key);
                state.objects.remove(&key);
                Ok(None)
            }
            Some(remaining) => {
                state.terminating.insert(key.clone(), remaining - 1);
                Ok(state.objects.get(&key).cloned())
            }
            None => Ok(state.objects.get(&key).cloned()),
        }
    }

    async fn delete(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
        propagation: Option<DeletionPropagation>,
    ) -> Result<DeleteOutcome> {
        let key = key(resource, namespace, name);
        let mut state = self.state();

        state.deletes.push(DeletedObject {
            namespace: namespace.to_owned(),
            name: name.to_owned(),
            propagation,
        });

        if !state.objects.contains_key(&key) {
            return Ok(DeleteOutcome::AlreadyGone);
        }

        if self.keep_after_delete > 0 {
            if !state.terminating.contains_key(&key) {
                state.terminating.insert(key, self.keep_after_delete);
            }
        } else {
            state.objects.remove(&key);
        }
        Ok(DeleteOutcome::Deleted)
    }
}
