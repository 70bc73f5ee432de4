//! Container runtime abstraction.
//!
//! # Data Flow
//! ```text
//! HealthProbe ── inspect(name) ──▶ ContainerRuntime ──▶ docker CLI
//! RecoveryController ── restart(name) ──▶ ContainerRuntime ──▶ docker CLI
//! ```
//!
//! # Design Decisions
//! - The breaker and controller only see this trait, never a process or socket
//! - Implementations bound every call with their own deadline
//! - A missing container is a state, not an error

pub mod docker;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub use docker::DockerCli;

/// Health status a container declares through its own healthcheck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclaredHealth {
    Healthy,
    Unhealthy,
    Starting,
}

/// Observed state of one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerState {
    /// The runtime does not know the container.
    Missing,
    /// Present but not running (exited, paused, restarting, ...).
    Stopped { status: String },
    /// Running; `health` is `None` when no healthcheck is defined.
    Running { health: Option<DeclaredHealth> },
}

/// Errors from runtime operations.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to spawn runtime command: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("runtime command timed out after {0:?}")]
    Timeout(Duration),

    #[error("runtime command exited with {code:?}: {stderr}")]
    CommandFailed { code: Option<i32>, stderr: String },

    #[error("unexpected runtime output: {0}")]
    Parse(String),
}

/// Narrow interface to whatever runs the supervised units.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Query presence, running state and declared health.
    async fn inspect(&self, name: &str) -> Result<ContainerState, RuntimeError>;

    /// Restart the unit. Returns once the runtime accepted the restart.
    async fn restart(&self, name: &str) -> Result<(), RuntimeError>;
}
