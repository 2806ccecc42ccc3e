//! Building blocks shared by all managed resources: the [`Resource`] lifecycle, the
//! provider-local model, import identifiers and waiting for conditions.

use std::{error::Error as StdError, fmt::Write, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use snafu::Snafu;

use crate::{
    client::{self, DynamicClient},
    diagnostics::{Diagnostic, Diagnostics},
    jsonpath,
    schema::ResourceSchema,
};

mod import;
mod model;
pub mod wait;

pub use import::*;
pub use model::*;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure to evaluate a `wait_for_upsert` condition, as opposed to the condition not holding.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConditionError {
    #[snafu(display("failed to fetch the object"))]
    FetchObject { source: client::Error },

    #[snafu(display("failed to encode the object as JSON"))]
    EncodeObject { source: serde_json::Error },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("the provider has not been configured"))]
    Unconfigured,

    #[snafu(display("the plan is invalid"))]
    InvalidPlan { diagnostics: Diagnostics },

    #[snafu(display("failed to deserialize {what}"))]
    Deserialize {
        source: serde_json::Error,
        what: &'static str,
    },

    #[snafu(display("failed to serialize {what}"))]
    Serialize {
        source: serde_json::Error,
        what: &'static str,
    },

    #[snafu(display("failed to apply {id}"))]
    Apply { source: client::Error, id: String },

    #[snafu(display("failed to read {id}"))]
    Get { source: client::Error, id: String },

    #[snafu(display("failed to delete {id}"))]
    Delete { source: client::Error, id: String },

    #[snafu(display("failed to wait for deletion of {id}"))]
    WaitForDelete {
        source: wait::PollError<client::Error>,
        id: String,
    },

    #[snafu(display("invalid JSONPath {jsonpath:?}"))]
    InvalidJsonPath {
        source: jsonpath::Error,
        jsonpath: String,
    },

    #[snafu(display("failed to wait for {jsonpath} of {id} to be {value:?}"))]
    WaitForUpsert {
        source: wait::PollError<ConditionError>,
        id: String,
        jsonpath: String,
        value: String,
    },

    #[snafu(display("failed to render the manifest of {id}"))]
    RenderManifest {
        source: k8s_provider_shared::yaml::Error,
        id: String,
    },

    #[snafu(display("failed to import"))]
    Import { source: ImportIdError },

    #[snafu(display("{id} does not exist"))]
    ObjectNotFound { id: String },
}

impl Error {
    /// A short summary for users, in the style of Terraform diagnostics.
    pub fn summary(&self) -> &'static str {
        match self {
            Self::Unconfigured => "Unconfigured provider",
            Self::InvalidPlan { .. } => "Invalid plan",
            Self::Deserialize { .. } => "Error unmarshalling JSON",
            Self::Serialize { .. } => "Error marshalling JSON",
            Self::Apply { .. } => "Error performing server-side apply",
            Self::Get { .. } => "Error reading resource",
            Self::Delete { .. } => "Error deleting resource",
            Self::WaitForDelete {
                source: wait::PollError::TimedOut { .. },
                ..
            } => "Timed out waiting for deletion",
            Self::WaitForDelete { .. } => "Error waiting for deletion",
            Self::InvalidJsonPath { .. } => "Invalid wait condition",
            Self::WaitForUpsert {
                source: wait::PollError::TimedOut { .. },
                ..
            } => "Timed out waiting for condition",
            Self::WaitForUpsert { .. } => "Error waiting for condition",
            Self::RenderManifest { .. } => "Error rendering manifest",
            Self::Import { .. } => "Error importing resource",
            Self::ObjectNotFound { .. } => "Cannot import non-existent remote object",
        }
    }

    /// The full error chain, e.g. `failed to read ns/name: failed to get ...: 403 Forbidden`.
    pub fn detail(&self) -> String {
        let mut detail = self.to_string();
        let mut source = self.source();
        while let Some(err) = source {
            write!(detail, ": {err}").expect("Writing to Strings can not fail");
            source = err.source();
        }
        detail
    }

    /// Presents the error as diagnostics. An invalid plan yields one diagnostic per problem.
    pub fn diagnostics(&self) -> Diagnostics {
        match self {
            Self::InvalidPlan { diagnostics } => diagnostics.clone(),
            _ => [Diagnostic::error(self.summary(), self.detail())]
                .into_iter()
                .collect(),
        }
    }
}

/// Whatever the provider hands to its resources once it is configured.
#[derive(Clone)]
pub struct ProviderData {
    pub client: Arc<dyn DynamicClient>,

    /// Used when a plan does not set a field manager.
    pub field_manager: String,
}

impl ProviderData {
    pub fn new(client: Arc<dyn DynamicClient>) -> Self {
        Self {
            client,
            field_manager: DEFAULT_FIELD_MANAGER.to_owned(),
        }
    }

    pub fn with_field_manager(mut self, field_manager: impl Into<String>) -> Self {
        self.field_manager = field_manager.into();
        self
    }
}

impl std::fmt::Debug for ProviderData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderData")
            .field("field_manager", &self.field_manager)
            .finish_non_exhaustive()
    }
}

/// The lifecycle of a managed resource, driven by the plugin host.
///
/// Plans and states are Terraform-shaped JSON values, i.e. objects keyed by snake_case
/// attribute names as declared in [`Resource::schema`].
#[async_trait]
pub trait Resource: Send + Sync {
    /// The full type name of the resource, given the type name of the provider.
    fn metadata(&self, provider_type_name: &str) -> String;

    fn schema(&self) -> &'static ResourceSchema;

    /// Called with [`None`] as long as the provider itself is not configured yet.
    fn configure(&mut self, provider_data: Option<ProviderData>);

    async fn create(&self, plan: &Value) -> Result<Value>;

    /// Returns [`None`] if the object no longer exists, which removes it from the state.
    async fn read(&self, state: &Value) -> Result<Option<Value>>;

    async fn update(&self, plan: &Value) -> Result<Value>;

    async fn delete(&self, state: &Value) -> Result<()>;

    /// Returns a partial state for the object identified by `id`, to be completed by
    /// [`Resource::read`].
    fn import_state(&self, id: &str) -> Result<Value>;

    /// Reports planned changes which cannot be applied in place.
    fn modify_plan(&self, prior: Option<&Value>, plan: &Value) -> Diagnostics;
}

/// A read-only data source, computed from its configuration alone.
pub trait DataSource: Send + Sync {
    fn metadata(&self, provider_type_name: &str) -> String;

    fn schema(&self) -> &'static ResourceSchema;

    fn read(&self, config: &Value) -> Result<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_includes_the_error_chain() {
        let error = Error::Import {
            source: "nope".parse::<ImportId>().unwrap_err(),
        };

        assert_eq!(error.summary(), "Error importing resource");
        assert_eq!(
            error.detail(),
            r#"failed to import: expected import identifier with format 'namespace/name', got "nope""#
        );
    }

    #[test]
    fn invalid_plan_keeps_all_diagnostics() {
        let diagnostics: Diagnostics = [
            Diagnostic::error("one", "first"),
            Diagnostic::error("two", "second"),
        ]
        .into_iter()
        .collect();
        let error = Error::InvalidPlan {
            diagnostics: diagnostics.clone(),
        };

        assert_eq!(error.diagnostics(), diagnostics);
    }

    #[test]
    fn timeouts_are_distinct() {
        let error = Error::WaitForDelete {
            source: wait::PollError::TimedOut {
                timeout: k8s_provider_shared::time::Duration::from_secs(30),
            },
            id: "couchbase/cb-example".to_owned(),
        };

        let diagnostics = error.diagnostics();
        let diagnostic = diagnostics.iter().next().unwrap();
        assert_eq!(diagnostic.summary, "Timed out waiting for deletion");
        assert_eq!(
            diagnostic.detail,
            "failed to wait for deletion of couchbase/cb-example: condition was not met within 30s"
        );
    }
}
