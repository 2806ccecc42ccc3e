//! Provider-level configuration: how to reach the Kubernetes cluster.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use kube::config::{Config, InferConfigError, KubeConfigOptions, Kubeconfig, KubeconfigError};
use snafu::{OptionExt, ResultExt, Snafu};

use crate::{
    client::Client,
    resource::{DEFAULT_FIELD_MANAGER, ProviderData},
};

pub const PROVIDER_TYPE_NAME: &str = "k8s";

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read kubeconfig from {path:?}"))]
    ReadKubeconfig {
        source: KubeconfigError,
        path: PathBuf,
    },

    #[snafu(display("failed to merge kubeconfig {path:?} into the preceding ones"))]
    MergeKubeconfig {
        source: KubeconfigError,
        path: PathBuf,
    },

    #[snafu(display("the kubeconfig path list {paths:?} names no files"))]
    EmptyKubeconfigPaths { paths: PathBuf },

    #[snafu(display("failed to load kubeconfig context {context:?}"))]
    LoadKubeconfig {
        source: KubeconfigError,
        context: String,
    },

    #[snafu(display("failed to infer the Kubernetes configuration"))]
    InferConfig { source: InferConfigError },

    #[snafu(display("failed to create Kubernetes client"))]
    CreateClient { source: kube::Error },
}

/// Options of the provider block.
#[derive(Debug, PartialEq, Eq, clap::Args)]
#[command(next_help_heading = "Provider Options")]
pub struct ProviderOptions {
    /// Path to the kubeconfig FILE, or a list of files separated like `PATH` entries.
    ///
    /// Files are merged the way kubectl merges them: the first file setting a value wins.
    /// Without it, the in-cluster configuration or the default kubeconfig is used.
    #[arg(long, env = "KUBECONFIG", value_name = "FILE")]
    pub kubeconfig: Option<PathBuf>,

    /// The kubeconfig context to use instead of the current context.
    #[arg(long, env = "KUBE_CONTEXT")]
    pub context: Option<String>,

    /// The field manager used for server-side apply, unless a resource sets its own.
    #[arg(long, env = "K8S_PROVIDER_FIELD_MANAGER", default_value = DEFAULT_FIELD_MANAGER)]
    pub field_manager: String,
}

impl ProviderOptions {
    /// Resolves the client configuration.
    pub async fn kube_config(&self) -> Result<Config> {
        let options = KubeConfigOptions {
            context: self.context.clone(),
            ..KubeConfigOptions::default()
        };
        let context = || self.context.clone().unwrap_or_default();

        match (&self.kubeconfig, &self.context) {
            (Some(paths), _) => {
                let kubeconfig = read_kubeconfigs(paths)?;
                Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .with_context(|_| LoadKubeconfigSnafu { context: context() })
            }
            (None, Some(_)) => Config::from_kubeconfig(&options)
                .await
                .with_context(|_| LoadKubeconfigSnafu { context: context() }),
            (None, None) => Config::infer().await.context(InferConfigSnafu),
        }
    }

    /// Creates the client shared by all resources.
    pub async fn configure(&self) -> Result<ProviderData> {
        let config = self.kube_config().await?;
        tracing::debug!(
            cluster_url = %config.cluster_url,
            default_namespace = %config.default_namespace,
            "configuring provider"
        );

        let client = kube::Client::try_from(config).context(CreateClientSnafu)?;
        Ok(ProviderData::new(Arc::new(Client::new(client)))
            .with_field_manager(self.field_manager.clone()))
    }
}

/// Reads and merges every kubeconfig of a `KUBECONFIG` style path list.
fn read_kubeconfigs(paths: &Path) -> Result<Kubeconfig> {
    let mut merged: Option<Kubeconfig> = None;
    for path in std::env::split_paths(paths).filter(|path| !path.as_os_str().is_empty()) {
        let kubeconfig = Kubeconfig::read_from(&path).context(ReadKubeconfigSnafu {
            path: path.clone(),
        })?;
        merged = Some(match merged {
            Some(merged) => merged
                .merge(kubeconfig)
                .context(MergeKubeconfigSnafu { path })?,
            None => kubeconfig,
        });
    }
    merged.context(EmptyKubeconfigPathsSnafu { paths })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::Parser;
    use indoc::indoc;
    use rstest::rstest;

    use super::*;

    const KUBECONFIG: &str = indoc! {"
        apiVersion: v1
        kind: Config
        clusters:
          - name: dev
            cluster:
              server: https://10.0.0.1:6443
          - name: prod
            cluster:
              server: https://10.0.0.2:6443
        contexts:
          - name: dev
            context:
              cluster: dev
              user: admin
              namespace: couchbase-dev
          - name: prod
            context:
              cluster: prod
              user: admin
              namespace: couchbase
        current-context: dev
        users:
          - name: admin
            user:
              token: not-a-real-token
    "};

    fn kubeconfig_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(KUBECONFIG.as_bytes()).unwrap();
        file
    }

    #[rstest]
    #[case(None, "10.0.0.1", "couchbase-dev")]
    #[case(Some("prod"), "10.0.0.2", "couchbase")]
    #[tokio::test]
    async fn loads_explicit_kubeconfig(
        #[case] context: Option<&str>,
        #[case] host: &str,
        #[case] namespace: &str,
    ) {
        let file = kubeconfig_file();
        let options = ProviderOptions {
            kubeconfig: Some(file.path().to_owned()),
            context: context.map(ToOwned::to_owned),
            field_manager: DEFAULT_FIELD_MANAGER.to_owned(),
        };

        let config = options.kube_config().await.unwrap();
        assert_eq!(config.cluster_url.host(), Some(host));
        assert_eq!(config.cluster_url.port_u16(), Some(6443));
        assert_eq!(config.default_namespace, namespace);
    }

    const DEV_KUBECONFIG: &str = indoc! {"
        apiVersion: v1
        kind: Config
        clusters:
          - name: dev
            cluster:
              server: https://10.0.0.1:6443
        contexts:
          - name: dev
            context:
              cluster: dev
              user: dev-admin
              namespace: couchbase-dev
        current-context: dev
        users:
          - name: dev-admin
            user:
              token: not-a-real-token
    "};

    const PROD_KUBECONFIG: &str = indoc! {"
        apiVersion: v1
        kind: Config
        clusters:
          - name: prod
            cluster:
              server: https://10.0.0.2:6443
        contexts:
          - name: prod
            context:
              cluster: prod
              user: prod-admin
              namespace: couchbase
        current-context: prod
        users:
          - name: prod-admin
            user:
              token: not-a-real-token
    "};

    #[rstest]
    #[case(None, "10.0.0.1", "couchbase-dev")]
    #[case(Some("prod"), "10.0.0.2", "couchbase")]
    #[tokio::test]
    async fn merges_kubeconfig_path_list(
        #[case] context: Option<&str>,
        #[case] host: &str,
        #[case] namespace: &str,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let dev = dir.path().join("dev.yaml");
        let prod = dir.path().join("prod.yaml");
        std::fs::write(&dev, DEV_KUBECONFIG).unwrap();
        std::fs::write(&prod, PROD_KUBECONFIG).unwrap();

        let options = ProviderOptions {
            kubeconfig: Some(std::env::join_paths([&dev, &prod]).unwrap().into()),
            context: context.map(ToOwned::to_owned),
            field_manager: DEFAULT_FIELD_MANAGER.to_owned(),
        };

        let config = options.kube_config().await.unwrap();
        assert_eq!(config.cluster_url.host(), Some(host));
        assert_eq!(config.default_namespace, namespace);
    }

    #[tokio::test]
    async fn rejects_empty_kubeconfig_path_list() {
        let options = ProviderOptions {
            kubeconfig: Some(std::env::join_paths(["", ""]).unwrap().into()),
            context: None,
            field_manager: DEFAULT_FIELD_MANAGER.to_owned(),
        };

        let error = options.kube_config().await.unwrap_err();
        assert!(matches!(error, Error::EmptyKubeconfigPaths { .. }));
    }

    #[tokio::test]
    async fn rejects_unknown_context() {
        let file = kubeconfig_file();
        let options = ProviderOptions {
            kubeconfig: Some(file.path().to_owned()),
            context: Some("staging".to_owned()),
            field_manager: DEFAULT_FIELD_MANAGER.to_owned(),
        };

        let error = options.kube_config().await.unwrap_err();
        assert!(matches!(error, Error::LoadKubeconfig { context, .. } if context == "staging"));
    }

    #[tokio::test]
    async fn rejects_missing_kubeconfig() {
        let dir = tempfile::tempdir().unwrap();
        let options = ProviderOptions {
            kubeconfig: Some(dir.path().join("missing")),
            context: None,
            field_manager: DEFAULT_FIELD_MANAGER.to_owned(),
        };

        let error = options.kube_config().await.unwrap_err();
        assert!(matches!(error, Error::ReadKubeconfig { .. }));
    }

    #[test]
    fn parses_arguments() {
        #[derive(Parser)]
        struct Cli {
            #[command(flatten)]
            provider: ProviderOptions,
        }

        let cli = Cli::parse_from([
            "k8s-provider",
            "--kubeconfig",
            "/etc/kubeconfig",
            "--context",
            "prod",
            "--field-manager",
            "platform-team",
        ]);
        assert_eq!(
            cli.provider,
            ProviderOptions {
                kubeconfig: Some(PathBuf::from("/etc/kubeconfig")),
                context: Some("prod".to_owned()),
                field_manager: "platform-team".to_owned(),
            }
        );
    }
}
