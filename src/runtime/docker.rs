//! Docker CLI runtime.

use async_trait::async_trait;
use serde::Deserialize;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::schema::RuntimeConfig;
use crate::runtime::{ContainerRuntime, ContainerState, DeclaredHealth, RuntimeError};

/// `docker inspect` / `docker restart` through the CLI.
#[derive(Debug, Clone)]
pub struct DockerCli {
    bin: String,
    inspect_timeout: Duration,
    restart_timeout: Duration,
    stop_grace_secs: u64,
}

/// Subset of `.State` from `docker inspect`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    status: String,
    running: bool,
    #[serde(default)]
    restarting: bool,
    #[serde(default)]
    health: Option<InspectHealth>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectHealth {
    status: String,
}

impl DockerCli {
    pub fn new(config: &RuntimeConfig, inspect_timeout: Duration) -> Self {
        Self {
            bin: config.docker_bin.clone(),
            inspect_timeout,
            restart_timeout: Duration::from_secs(config.restart_timeout_secs),
            stop_grace_secs: config.stop_grace_secs,
        }
    }

    async fn exec(&self, args: &[&str], deadline: Duration) -> Result<Output, RuntimeError> {
        let child = Command::new(&self.bin)
            .args(args)
            .kill_on_drop(true)
            .output();

        match timeout(deadline, child).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(RuntimeError::Timeout(deadline)),
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn inspect(&self, name: &str) -> Result<ContainerState, RuntimeError> {
        let output = self
            .exec(
                &["inspect", "--type", "container", "--format", "{{json .State}}", name],
                self.inspect_timeout,
            )
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stderr.contains("No such") {
                return Ok(ContainerState::Missing);
            }
            return Err(RuntimeError::CommandFailed {
                code: output.status.code(),
                stderr,
            });
        }

        parse_state(&String::from_utf8_lossy(&output.stdout))
    }

    async fn restart(&self, name: &str) -> Result<(), RuntimeError> {
        let grace = self.stop_grace_secs.to_string();
        tracing::debug!(container = %name, "docker restart");

        let output = self
            .exec(&["restart", "-t", &grace, name], self.restart_timeout)
            .await?;

        if output.status.success() {
            Ok(())
        } else {
            Err(RuntimeError::CommandFailed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

fn parse_state(raw: &str) -> Result<ContainerState, RuntimeError> {
    let state: InspectState =
        serde_json::from_str(raw.trim()).map_err(|e| RuntimeError::Parse(e.to_string()))?;

    if !state.running || state.restarting {
        let status = if state.restarting { "restarting".to_string() } else { state.status };
        return Ok(ContainerState::Stopped { status });
    }

    let health = match state.health.as_ref().map(|h| h.status.as_str()) {
        None | Some("none") => None,
        Some("healthy") => Some(DeclaredHealth::Healthy),
        Some("starting") => Some(DeclaredHealth::Starting),
        Some("unhealthy") => Some(DeclaredHealth::Unhealthy),
        Some(other) => return Err(RuntimeError::Parse(format!("unknown health status '{}'", other))),
    };

    Ok(ContainerState::Running { health })
}
