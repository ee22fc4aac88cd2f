//! # nexus-staging CLI
//!
//! ## Available Commands
//!
//! - `status` - Check credentials and show server capability
//! - `version` - Print the server version
//! - `list` - List open staging repositories
//! - `find` - Find the open stage holding a group/artifact/version
//! - `close` - Close a stage, retrying and optionally dropping on failure
//! - `drop` - Drop a stage
//! - `release` - Release a closed stage
//! - `activity` - Show the activity log of a stage

mod commands;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use nexus_staging::config::{ClientConfig, PollConfig};
use std::path::PathBuf;
use std::time::Duration;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Drive staging repositories on a Nexus repository manager.
#[derive(Parser, Debug)]
#[command(name = "nexus-staging")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Base URL of the repository manager
    #[arg(long, env = "NEXUS_URL", global = true)]
    pub url: Option<String>,

    /// User name
    #[arg(short, long, env = "NEXUS_USERNAME", global = true)]
    pub username: Option<String>,

    /// Password
    #[arg(short, long, env = "NEXUS_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// JSON client configuration file; flags override its values
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Milliseconds between polls while an action is in progress
    #[arg(long, global = true)]
    pub poll_interval_ms: Option<u64>,

    /// Give up waiting after this many polls
    #[arg(long, global = true)]
    pub max_polls: Option<u32>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check credentials and show server capability
    Status,

    /// Print the server version
    Version,

    /// List open staging repositories
    List,

    /// Find the open stage holding the given coordinates
    Find(Coordinates),

    /// Close a stage
    Close {
        #[command(flatten)]
        target: StageTarget,

        /// Description recorded with the close
        #[arg(short, long, default_value = "Closed by nexus-staging")]
        description: String,

        /// Number of close attempts
        #[arg(long, default_value = "5")]
        attempts: u32,

        /// Seconds between close attempts
        #[arg(long, default_value = "15")]
        retry_delay_secs: u64,

        /// Drop the stage if it cannot be closed
        #[arg(long)]
        drop_on_failure: bool,
    },

    /// Drop a stage
    Drop {
        #[command(flatten)]
        target: StageTarget,
    },

    /// Release a closed stage
    Release {
        #[command(flatten)]
        target: StageTarget,

        /// Description recorded with the release
        #[arg(short, long, default_value = "Released by nexus-staging")]
        description: String,
    },

    /// Show the activity log of a stage
    Activity {
        #[command(flatten)]
        target: StageTarget,
    },
}

/// Group/artifact/version coordinates.
#[derive(Args, Debug, Clone)]
pub struct Coordinates {
    /// Group id, e.g. `org.example`
    #[arg(short, long)]
    pub group: String,

    /// Artifact id
    #[arg(short, long)]
    pub artifact: String,

    /// Version; any version matches when omitted
    #[arg(short = 'v', long = "artifact-version")]
    pub version: Option<String>,
}

/// Selects a stage by id or by the coordinates it holds.
#[derive(Args, Debug, Clone)]
pub struct StageTarget {
    /// Staging repository id
    #[arg(short, long, conflicts_with = "group")]
    pub stage: Option<String>,

    /// Staging profile id; looked up among open stages when omitted
    #[arg(long, requires = "stage")]
    pub profile: Option<String>,

    /// Group id of an artifact in the stage
    #[arg(short, long, requires = "artifact")]
    pub group: Option<String>,

    /// Artifact id
    #[arg(short, long, requires = "group")]
    pub artifact: Option<String>,

    /// Artifact version
    #[arg(short = 'v', long = "artifact-version", requires = "group")]
    pub version: Option<String>,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

impl Cli {
    /// Builds the client configuration from the config file and flags.
    pub fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_json_file(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => {
                let url = self
                    .url
                    .clone()
                    .context("no server URL; pass --url or set NEXUS_URL")?;
                ClientConfig::new(url)
            }
        };

        if let (Some(_), Some(url)) = (&self.config, &self.url) {
            config.base_url.clone_from(url);
        }
        if let Some(username) = &self.username {
            config.username.clone_from(username);
        }
        if let Some(password) = &self.password {
            config.password.clone_from(password);
        }

        let mut poll: PollConfig = config.poll.clone();
        if let Some(ms) = self.poll_interval_ms {
            poll = poll.with_interval(Duration::from_millis(ms));
        }
        if let Some(max) = self.max_polls {
            poll = poll.with_max_attempts(max);
        }
        Ok(config.with_poll(poll))
    }
}

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    let client = connect(&cli.client_config()?)?;
    let out = Output { json: cli.json };

    match cli.command {
        Commands::Status => cmd_status(&client, out).await,
        Commands::Version => cmd_version(&client, out).await,
        Commands::List => cmd_list(&client, out).await,
        Commands::Find(coordinates) => cmd_find(&client, out, &coordinates).await,
        Commands::Close {
            target,
            description,
            attempts,
            retry_delay_secs,
            drop_on_failure,
        } => {
            let retry = CloseRetry {
                attempts,
                delay: Duration::from_secs(retry_delay_secs),
                drop_on_failure,
            };
            cmd_close(&client, out, &target, &description, &retry).await
        }
        Commands::Drop { target } => cmd_drop(&client, out, &target).await,
        Commands::Release {
            target,
            description,
        } => cmd_release(&client, out, &target, &description).await,
        Commands::Activity { target } => cmd_activity(&client, out, &target).await,
    }
}
