use std::process::ExitCode;

use clap::Parser;
use k8s_provider::cli::{self, Cli};
use k8s_provider_telemetry::Tracing;

const APP_NAME: &str = "k8s-provider";

#[tokio::main]
async fn main() -> ExitCode {
    let Cli {
        command,
        provider,
        telemetry,
    } = Cli::parse();

    // The guard flushes the file logs when dropped, so it must live until the command finished.
    let _tracing_guard = match Tracing::pre_configured(APP_NAME, telemetry).init() {
        Ok(guard) => guard,
        Err(error) => {
            eprintln!("{}", snafu::Report::from_error(error));
            return ExitCode::FAILURE;
        }
    };

    match cli::run(command, &provider, &mut std::io::stdout()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::debug!(%error, "command failed");
            for diagnostic in error.diagnostics() {
                eprintln!("{diagnostic}");
            }
            ExitCode::FAILURE
        }
    }
}
