//! Command line interface driving the resource lifecycle from plan and state files.
//!
//! Plans and states are Terraform-shaped objects written as YAML (or JSON). States are printed
//! as YAML on stdout, so the output of `apply` can be fed into `read` and `delete`.

use std::{
    error::Error as StdError,
    fmt::Write as _,
    future::Future,
    io::Write,
    path::{Path, PathBuf},
};

use clap::{Args, Parser, Subcommand};
use k8s_provider_shared::yaml::{self, SerializeOptions};
use k8s_provider_telemetry::tracing::TelemetryOptions;
use serde_json::Value;
use snafu::{ResultExt, Snafu, ensure};

use crate::{
    couchbase::cluster_v2::{CouchbaseClusterV2, CouchbaseClusterV2Manifest, SCHEMA},
    diagnostics::{Diagnostic, Diagnostics},
    provider::{self, PROVIDER_TYPE_NAME, ProviderOptions},
    resource::{self, DataSource, ProviderData, Resource},
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read {path:?}"))]
    ReadFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to parse {path:?}"))]
    ParseFile {
        source: serde_yaml::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to configure the provider"))]
    Configure { source: provider::Error },

    #[snafu(display("the plan is invalid"))]
    InvalidPlan { diagnostics: Diagnostics },

    #[snafu(display("the planned changes require replacing the resource"))]
    RequiresReplacement { diagnostics: Diagnostics },

    #[snafu(display("failed to {operation} {type_name}"))]
    Lifecycle {
        source: resource::Error,
        operation: &'static str,
        type_name: String,
    },

    #[snafu(display("failed to render output"))]
    RenderOutput { source: yaml::Error },

    #[snafu(display("failed to render the schema"))]
    RenderSchema { source: serde_json::Error },

    #[snafu(display("failed to write output"))]
    WriteOutput { source: std::io::Error },
}

impl Error {
    /// Presents the error as diagnostics, ready to be printed.
    pub fn diagnostics(&self) -> Diagnostics {
        match self {
            Self::InvalidPlan { diagnostics } | Self::RequiresReplacement { diagnostics } => {
                diagnostics.clone()
            }
            Self::Lifecycle { source, .. } => source.diagnostics(),
            _ => {
                let mut detail = self.to_string();
                let mut source = self.source();
                while let Some(err) = source {
                    write!(detail, ": {err}").expect("Writing to Strings can not fail");
                    source = err.source();
                }
                [Diagnostic::error("Error running command", detail)]
                    .into_iter()
                    .collect()
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    // All (flattened) sub structs are placed at the end to keep the help headings correct.
    #[command(flatten)]
    pub provider: ProviderOptions,

    #[command(flatten)]
    pub telemetry: TelemetryOptions,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Print the resource schema as JSON.
    Schema,

    /// Validate a plan and print every problem found.
    Validate(InputFile),

    /// Render the Kubernetes manifest of a plan, without contacting the cluster.
    Manifest(InputFile),

    /// Create the object of a plan and print the new state.
    ///
    /// With a prior state the object is updated instead. Changes which cannot be applied in
    /// place are refused.
    Apply {
        #[command(flatten)]
        plan: InputFile,

        /// The state FILE printed by a previous apply.
        #[arg(long, value_name = "FILE")]
        prior: Option<PathBuf>,
    },

    /// Refresh a state from the cluster.
    Read(InputFile),

    /// Delete the object of a state.
    Delete(InputFile),

    /// Import an existing object, identified as `<namespace>/<name>`, and print its state.
    Import {
        /// The identifier of the object, `<namespace>/<name>`.
        id: String,
    },
}

#[derive(Debug, PartialEq, Eq, Args)]
pub struct InputFile {
    /// The plan or state FILE, as YAML or JSON.
    #[arg(long = "file", short = 'f', value_name = "FILE")]
    pub path: PathBuf,
}

impl InputFile {
    fn read(&self) -> Result<Value> {
        read_value(&self.path)
    }
}

fn read_value(path: &Path) -> Result<Value> {
    let contents = std::fs::read_to_string(path).context(ReadFileSnafu { path })?;
    serde_yaml::from_str(&contents).context(ParseFileSnafu { path })
}

fn write_yaml(out: &mut impl Write, value: &Value) -> Result<()> {
    let rendered = yaml::to_string(value, SerializeOptions::default()).context(RenderOutputSnafu)?;
    out.write_all(rendered.as_bytes()).context(WriteOutputSnafu)
}

async fn configure(options: &ProviderOptions) -> Result<ProviderData> {
    options.configure().await.context(ConfigureSnafu)
}

/// Runs `command`, configuring the provider from `options` only when the cluster is needed.
pub async fn run(command: Command, options: &ProviderOptions, out: &mut impl Write) -> Result<()> {
    execute(command, || configure(options), out).await
}

async fn execute<F, Fut>(command: Command, configure: F, out: &mut impl Write) -> Result<()>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<ProviderData>>,
{
    let mut resource = CouchbaseClusterV2::default();
    let type_name = resource.metadata(PROVIDER_TYPE_NAME);
    let lifecycle = |operation| LifecycleSnafu {
        operation,
        type_name: &type_name,
    };

    match command {
        Command::Schema => {
            let rendered =
                serde_json::to_string_pretty(resource.schema()).context(RenderSchemaSnafu)?;
            writeln!(out, "{rendered}").context(WriteOutputSnafu)
        }
        Command::Validate(plan) => {
            let diagnostics = SCHEMA.validate(&plan.read()?);
            ensure!(!diagnostics.has_errors(), InvalidPlanSnafu { diagnostics });
            tracing::info!(warnings = diagnostics.len(), "plan is valid");
            Ok(())
        }
        Command::Manifest(plan) => {
            let manifest = CouchbaseClusterV2Manifest;
            let state = manifest.read(&plan.read()?).with_context(|_| LifecycleSnafu {
                operation: "render",
                type_name: manifest.metadata(PROVIDER_TYPE_NAME),
            })?;
            let rendered = state["yaml"].as_str().unwrap_or_default();
            out.write_all(rendered.as_bytes()).context(WriteOutputSnafu)
        }
        Command::Apply { plan, prior } => {
            let plan = plan.read()?;
            let prior = prior.as_deref().map(read_value).transpose()?;

            let diagnostics = resource.modify_plan(prior.as_ref(), &plan);
            ensure!(
                !diagnostics.has_errors(),
                RequiresReplacementSnafu { diagnostics }
            );

            resource.configure(Some(configure().await?));
            let state = match prior {
                Some(_) => resource.update(&plan).await.context(lifecycle("update"))?,
                None => resource.create(&plan).await.context(lifecycle("create"))?,
            };
            write_yaml(out, &state)
        }
        Command::Read(state) => {
            let state = state.read()?;
            resource.configure(Some(configure().await?));
            match resource.read(&state).await.context(lifecycle("read"))? {
                Some(state) => write_yaml(out, &state),
                None => {
                    tracing::warn!("object no longer exists");
                    Ok(())
                }
            }
        }
        Command::Delete(state) => {
            let state = state.read()?;
            resource.configure(Some(configure().await?));
            resource.delete(&state).await.context(lifecycle("delete"))?;
            tracing::info!("object deleted");
            Ok(())
        }
        Command::Import { id } => {
            let imported = resource.import_state(&id).context(lifecycle("import"))?;
            resource.configure(Some(configure().await?));
            match resource.read(&imported).await.context(lifecycle("read"))? {
                Some(state) => write_yaml(out, &state),
                None => Err(resource::Error::ObjectNotFound { id }).context(lifecycle("import")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use clap::CommandFactory;
    use indoc::indoc;

    use super::*;
    use crate::{client::fake::FakeClient, couchbase::cluster_v2::api_resource};

    const PLAN: &str = indoc! {"
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
    "};

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    async fn execute_with(client: &Arc<FakeClient>, command: Command) -> Result<String> {
        let client = client.clone();
        let mut out = Vec::new();
        execute(
            command,
            || async move { Ok::<_, Error>(ProviderData::new(client)) },
            &mut out,
        )
        .await?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_apply() {
        let cli = Cli::parse_from([
            "k8s-provider",
            "--file-log-directory",
            "/var/log/k8s-provider",
            "--file-log-max-files",
            "3",
            "apply",
            "-f",
            "plan.yaml",
            "--prior",
            "state.yaml",
        ]);
        assert_eq!(
            cli.telemetry.file_log_directory,
            Some(PathBuf::from("/var/log/k8s-provider"))
        );
        assert_eq!(cli.telemetry.file_log_max_files, Some(3));
        assert_eq!(
            cli.command,
            Command::Apply {
                plan: InputFile {
                    path: PathBuf::from("plan.yaml")
                },
                prior: Some(PathBuf::from("state.yaml")),
            }
        );
    }

    #[tokio::test]
    async fn prints_schema() {
        let client = Arc::new(FakeClient::new());
        let out = execute_with(&client, Command::Schema).await.unwrap();

        let schema: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(schema["attributes"][0]["name"], "id");
    }

    #[tokio::test]
    async fn validate_reports_all_problems() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "plan.yaml", indoc! {"
            metadata:
              name: cb-example
            spec:
              image: couchbase/server:7.6.0
              platform: openstack
        "});

        let client = Arc::new(FakeClient::new());
        let error = execute_with(&client, Command::Validate(InputFile { path }))
            .await
            .unwrap_err();

        let diagnostics = error.diagnostics();
        assert_eq!(diagnostics.at("metadata.namespace").count(), 1);
        assert_eq!(diagnostics.at("spec.platform").count(), 1);
        assert_eq!(diagnostics.at("spec.security").count(), 1);
        assert_eq!(diagnostics.at("spec.servers").count(), 1);
    }

    #[tokio::test]
    async fn renders_manifest_offline() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "plan.yaml", PLAN);

        let mut out = Vec::new();
        execute(
            Command::Manifest(InputFile { path }),
            || async {
                Err::<ProviderData, _>(Error::InvalidPlan {
                    diagnostics: Diagnostics::default(),
                })
            },
            &mut out,
        )
        .await
        .unwrap();

        let manifest = String::from_utf8(out).unwrap();
        assert!(
            manifest.starts_with("---\napiVersion: couchbase.com/v2\nkind: CouchbaseCluster\n")
        );
    }

    #[tokio::test]
    async fn apply_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let plan = write_file(&dir, "plan.yaml", PLAN);
        let client = Arc::new(FakeClient::new());

        let state = execute_with(
            &client,
            Command::Apply {
                plan: InputFile { path: plan.clone() },
                prior: None,
            },
        )
        .await
        .unwrap();
        assert!(state.starts_with("---\n"));
        let state_path = write_file(&dir, "state.yaml", &state);

        let read = execute_with(&client, Command::Read(InputFile { path: state_path.clone() }))
            .await
            .unwrap();
        assert_eq!(read, state);

        execute_with(&client, Command::Delete(InputFile { path: state_path }))
            .await
            .unwrap();
        assert!(client.object(&api_resource(), "couchbase", "cb-example").is_none());
    }

    #[tokio::test]
    async fn apply_refuses_replacement() {
        let dir = tempfile::tempdir().unwrap();
        let plan = write_file(&dir, "plan.yaml", &PLAN.replace("cb-example\n", "cb-renamed\n"));
        let prior = write_file(&dir, "prior.yaml", PLAN);
        let client = Arc::new(FakeClient::new());

        let error = execute_with(
            &client,
            Command::Apply {
                plan: InputFile { path: plan },
                prior: Some(prior),
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(error, Error::RequiresReplacement { .. }));
        assert!(client.applies().is_empty());
    }

    #[tokio::test]
    async fn import_missing_object() {
        let client = Arc::new(FakeClient::new());
        let error = execute_with(
            &client,
            Command::Import {
                id: "couchbase/cb-example".to_owned(),
            },
        )
        .await
        .unwrap_err();

        let diagnostics = error.diagnostics();
        let diagnostic = diagnostics.iter().next().unwrap();
        assert_eq!(diagnostic.summary, "Cannot import non-existent remote object");
    }
}
