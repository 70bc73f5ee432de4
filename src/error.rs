//! Error taxonomy for the supervisor.
//!
//! Only configuration errors are fatal, and only at startup. Everything the
//! loop encounters at runtime is logged and folded into a health or breaker
//! outcome instead of unwinding the process.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::config::loader::ConfigError;
use crate::runtime::RuntimeError;

/// Errors surfaced by supervisor components.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A probe did not complete within its deadline.
    #[error("probe timed out after {0:?}")]
    ProbeTimeout(Duration),

    /// The container runtime rejected or failed a restart.
    #[error("restart of '{service}' failed: {source}")]
    RestartActionFailed {
        service: String,
        #[source]
        source: RuntimeError,
    },

    /// A state or status document could not be written.
    #[error("failed to persist {path}: {source}")]
    PersistenceWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Another live supervisor holds the lock. `pid` is 0 while the holder
    /// has created the file but not yet written its PID.
    #[error("supervisor lock {path} is held by pid {pid}")]
    LockContention { path: PathBuf, pid: u32 },

    /// A notification sink could not be reached.
    #[error("notification to {sink} failed: {reason}")]
    NotificationDeliveryFailed { sink: String, reason: String },

    /// The persisted document was written by a newer schema.
    #[error("unsupported state document version {found} (max {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SupervisorResult<T> = Result<T, SupervisorError>;
