//! # nexus-staging
//!
//! Command-line access to the staging workflow of a Nexus repository
//! manager.
//!
//! ```bash
//! export NEXUS_URL=https://oss.example.org/nexus NEXUS_USERNAME=deployer NEXUS_PASSWORD=...
//! nexus-staging status
//! nexus-staging find --group org.example --artifact app --artifact-version 1.0
//! nexus-staging close --group org.example --artifact app --drop-on-failure
//! nexus-staging release --stage orgexample-1001 --profile 12a4b
//! ```
//!
//! Set `NEXUS_STAGING_LOG_FORMAT=json` for JSON logs and `RUST_LOG` to
//! change verbosity.

mod cli;

use clap::Parser;
use nexus_staging::observability::{init_tracing, LogFormat};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = init_tracing(LogFormat::from_env()) {
        eprintln!("warning: {e}");
    }

    let cli = cli::Cli::parse();

    match cli::execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
