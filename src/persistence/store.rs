//! Durable snapshots with write-temp-then-rename.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{SupervisorError, SupervisorResult};
use crate::persistence::state::SupervisorState;

/// Current schema version of `state.json`.
pub const STATE_VERSION: u32 = 1;

const STATE_FILE: &str = "state.json";
const STATUS_FILE: &str = "status.json";

/// On-disk envelope around [`SupervisorState`].
#[derive(Debug, Serialize, Deserialize)]
struct StateDocument {
    version: u32,
    written_at: DateTime<Utc>,
    #[serde(flatten)]
    state: SupervisorState,
}

/// Files under the state directory.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    pub fn status_path(&self) -> PathBuf {
        self.dir.join(STATUS_FILE)
    }

    /// Persist the full state. Readers see either the old or the new
    /// document, never a partial one.
    pub fn snapshot(&self, state: &SupervisorState, now: DateTime<Utc>) -> SupervisorResult<()> {
        let doc = StateDocument {
            version: STATE_VERSION,
            written_at: now,
            state: state.clone(),
        };
        self.write_json(&self.state_path(), &doc)
    }

    /// Restore the last snapshot. A missing file is an empty state.
    pub fn load(&self) -> SupervisorResult<SupervisorState> {
        let path = self.state_path();
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No previous state, starting fresh");
                return Ok(SupervisorState::default());
            }
            Err(e) => return Err(e.into()),
        };

        let doc: StateDocument = serde_json::from_slice(&raw)?;
        if doc.version > STATE_VERSION {
            return Err(SupervisorError::UnsupportedVersion {
                found: doc.version,
                supported: STATE_VERSION,
            });
        }

        tracing::info!(
            path = %path.display(),
            written_at = %doc.written_at,
            breakers = doc.state.breakers.len(),
            "Restored supervisor state"
        );
        Ok(doc.state)
    }

    /// [`load`](Self::load), but an unreadable document is moved to
    /// `state.json.corrupt` and an empty state is returned.
    pub fn load_or_quarantine(&self) -> SupervisorResult<SupervisorState> {
        match self.load() {
            Ok(state) => Ok(state),
            Err(SupervisorError::Json(e)) => {
                self.quarantine(&e.to_string())?;
                Ok(SupervisorState::default())
            }
            Err(e @ SupervisorError::UnsupportedVersion { .. }) => {
                self.quarantine(&e.to_string())?;
                Ok(SupervisorState::default())
            }
            Err(e) => Err(e),
        }
    }

    fn quarantine(&self, reason: &str) -> SupervisorResult<()> {
        let path = self.state_path();
        let aside = path.with_extension("json.corrupt");
        tracing::warn!(
            path = %path.display(),
            moved_to = %aside.display(),
            reason,
            "State document unreadable, starting with empty state"
        );
        fs::rename(&path, &aside)?;
        Ok(())
    }

    /// Write the merged status report for the offline read path.
    pub fn write_status<T: Serialize>(&self, report: &T) -> SupervisorResult<()> {
        self.write_json(&self.status_path(), report)
    }

    pub fn read_status<T: DeserializeOwned>(&self) -> SupervisorResult<T> {
        let raw = fs::read(self.status_path())?;
        Ok(serde_json::from_slice(&raw)?)
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> SupervisorResult<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        write_atomic(path, &bytes).map_err(|source| SupervisorError::PersistenceWriteFailed {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;

    // Persist the rename itself.
    #[cfg(unix)]
    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    Ok(())
}
