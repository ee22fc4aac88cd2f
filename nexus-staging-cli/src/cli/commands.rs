//! # CLI Command Implementations

use super::{Coordinates, StageTarget};
use anyhow::{bail, Context};
use nexus_staging::cancellation::CancellationToken;
use nexus_staging::client::{ReqwestTransport, StageClient, Transport};
use nexus_staging::config::ClientConfig;
use nexus_staging::core::Stage;
use nexus_staging::errors::{ErrorOrigin, StageError};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

// =============================================================================
// SHARED PLUMBING
// =============================================================================

/// Creates a client whose waits are interrupted by Ctrl-C.
pub fn connect(config: &ClientConfig) -> anyhow::Result<StageClient<ReqwestTransport>> {
    let token = Arc::new(CancellationToken::new());
    let watcher = Arc::clone(&token);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            watcher.cancel("interrupted by Ctrl-C");
        }
    });

    let client = StageClient::from_config(config).context("creating staging client")?;
    Ok(client.with_cancellation(token))
}

/// Where command results go.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    /// Print JSON instead of text.
    pub json: bool,
}

impl Output {
    fn emit(self, value: &Value, text: impl FnOnce() -> String) {
        if self.json {
            println!("{value}");
        } else {
            println!("{}", text());
        }
    }
}

/// Caller-side retry policy for `close`.
#[derive(Debug, Clone)]
pub struct CloseRetry {
    /// Total number of attempts, at least one is always made.
    pub attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
    /// Drop the stage once every attempt has failed.
    pub drop_on_failure: bool,
}

/// Failures worth another close attempt.
fn is_retryable(err: &StageError) -> bool {
    err.origin() == ErrorOrigin::Transport
}

async fn resolve_stage<T: Transport>(
    client: &StageClient<T>,
    target: &StageTarget,
) -> anyhow::Result<Stage> {
    match (&target.stage, &target.profile, &target.group, &target.artifact) {
        (Some(stage), Some(profile), _, _) => Ok(Stage::new(profile.clone(), stage.clone())),
        (Some(stage), None, _, _) => client
            .open_stages()
            .await?
            .into_iter()
            .find(|s| s.stage_id() == stage)
            .with_context(|| format!("stage {stage} is not open; pass --profile to address it")),
        (None, _, Some(group), Some(artifact)) => client
            .find_open_stage(group, artifact, target.version.as_deref())
            .await?
            .with_context(|| format!("no open stage holds {group}:{artifact}")),
        _ => bail!("select a stage with --stage or with --group and --artifact"),
    }
}

// =============================================================================
// QUERY COMMANDS
// =============================================================================

/// Checks credentials and reports the server capability.
pub async fn cmd_status<T: Transport>(client: &StageClient<T>, out: Output) -> anyhow::Result<()> {
    client.check_authentication().await?;
    let capability = client.capability().await?;
    out.emit(
        &json!({
            "url": client.base_url().as_str(),
            "authenticated": true,
            "capability": capability,
        }),
        || {
            format!(
                "Server:   {}\nVersion:  {}\nActions:  {}",
                client.base_url(),
                capability.version(),
                if capability.async_actions() { "asynchronous" } else { "synchronous" }
            )
        },
    );
    Ok(())
}

/// Prints the server version.
pub async fn cmd_version<T: Transport>(client: &StageClient<T>, out: Output) -> anyhow::Result<()> {
    let version = client.server_version().await?;
    out.emit(&json!({ "version": version }), || version.clone());
    Ok(())
}

/// Lists open stages.
pub async fn cmd_list<T: Transport>(client: &StageClient<T>, out: Output) -> anyhow::Result<()> {
    let stages = client.open_stages().await?;
    out.emit(&json!(stages), || {
        if stages.is_empty() {
            return "No open stages".to_string();
        }
        stages
            .iter()
            .map(|s| format!("{}\t{}", s.stage_id(), s.profile_id()))
            .collect::<Vec<_>>()
            .join("\n")
    });
    Ok(())
}

/// Finds the open stage holding the given coordinates.
pub async fn cmd_find<T: Transport>(
    client: &StageClient<T>,
    out: Output,
    coordinates: &Coordinates,
) -> anyhow::Result<()> {
    let found = client
        .find_open_stage(
            &coordinates.group,
            &coordinates.artifact,
            coordinates.version.as_deref(),
        )
        .await?;
    out.emit(&json!({ "stage": found }), || match &found {
        Some(stage) => stage.to_string(),
        None => "No matching open stage".to_string(),
    });
    Ok(())
}

/// Prints the activity log of a stage.
pub async fn cmd_activity<T: Transport>(
    client: &StageClient<T>,
    out: Output,
    target: &StageTarget,
) -> anyhow::Result<()> {
    let stage = resolve_stage(client, target).await?;
    let activities = client.activity(&stage).await?;
    out.emit(&json!({ "stage": stage, "activities": activities }), || {
        let mut text = format!("Activity of {stage}");
        for activity in &activities {
            text.push_str(&format!("\n{}", activity.name));
            for event in &activity.events {
                text.push_str(&format!("\n  {}", event.name));
                for (name, value) in &event.properties {
                    text.push_str(&format!("\n    {name}: {value}"));
                }
            }
        }
        text
    });
    Ok(())
}

// =============================================================================
// TRANSITION COMMANDS
// =============================================================================

/// Closes a stage, retrying transport failures and optionally dropping it
/// when every attempt fails. An interrupted close is never followed by a drop.
pub async fn cmd_close<T: Transport>(
    client: &StageClient<T>,
    out: Output,
    target: &StageTarget,
    description: &str,
    retry: &CloseRetry,
) -> anyhow::Result<()> {
    let stage = resolve_stage(client, target).await?;
    let attempts = retry.attempts.max(1);

    let mut attempt = 1;
    loop {
        let err = match client.close_stage(&stage, description).await {
            Ok(()) => break,
            Err(err) => err,
        };

        if attempt < attempts && is_retryable(&err) {
            warn!(stage = %stage, attempt, attempts, error = %err, "Close failed, retrying");
            tokio::select! {
                () = client.cancellation().cancelled() => {
                    bail!("interrupted while retrying close of {stage}");
                }
                () = tokio::time::sleep(retry.delay) => {}
            }
            attempt += 1;
            continue;
        }

        if retry.drop_on_failure {
            if err.origin() == ErrorOrigin::Interrupted {
                warn!(stage = %stage, "Close interrupted, not dropping stage");
            } else {
                warn!(stage = %stage, error = %err, "Close failed, dropping stage");
                client
                    .drop_stage(&stage)
                    .await
                    .with_context(|| format!("dropping {stage} after failed close"))?;
            }
        }
        return Err(err).with_context(|| format!("closing {stage}"));
    }

    info!(stage = %stage, attempt, "Close complete");
    out.emit(&json!({ "stage": stage, "action": "close" }), || format!("Closed {stage}"));
    Ok(())
}

/// Drops a stage.
pub async fn cmd_drop<T: Transport>(
    client: &StageClient<T>,
    out: Output,
    target: &StageTarget,
) -> anyhow::Result<()> {
    let stage = resolve_stage(client, target).await?;
    client.drop_stage(&stage).await?;
    out.emit(&json!({ "stage": stage, "action": "drop" }), || {
        format!("Requested drop of {stage}")
    });
    Ok(())
}

/// Releases a stage.
pub async fn cmd_release<T: Transport>(
    client: &StageClient<T>,
    out: Output,
    target: &StageTarget,
    description: &str,
) -> anyhow::Result<()> {
    let stage = resolve_stage(client, target).await?;
    client.release_stage(&stage, description).await?;
    out.emit(&json!({ "stage": stage, "action": "release" }), || {
        format!("Released {stage}")
    });
    Ok(())
}
