//! Advisory PID lock over the state directory.
//!
//! The lock file is created exclusively and holds the owner's PID. A file
//! left behind by a dead process is reclaimed. A file without a readable
//! PID is only reclaimed once it is older than [`UNWRITTEN_GRACE`]: a
//! racing instance may have created it and not yet written its PID.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::error::{SupervisorError, SupervisorResult};

/// Age after which an empty or unparsable lock file counts as abandoned.
pub const UNWRITTEN_GRACE: Duration = Duration::from_secs(10);

/// Held lock. The file is removed on drop.
#[derive(Debug)]
pub struct PidLock {
    path: PathBuf,
    pid: u32,
}

impl PidLock {
    /// Acquire `path` for the current process.
    pub fn acquire(path: &Path) -> SupervisorResult<Self> {
        Self::acquire_as(path, std::process::id())
    }

    fn acquire_as(path: &Path, pid: u32) -> SupervisorResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // One reclaim attempt: a second collision means a live racer won.
        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    writeln!(file, "{}", pid)?;
                    file.sync_all()?;
                    tracing::debug!(path = %path.display(), pid, "Acquired supervisor lock");
                    return Ok(Self { path: path.to_path_buf(), pid });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    match read_owner(path) {
                        Some(owner) if owner != pid && process_alive(owner) => {
                            return Err(SupervisorError::LockContention {
                                path: path.to_path_buf(),
                                pid: owner,
                            });
                        }
                        None if !abandoned(path) => {
                            return Err(SupervisorError::LockContention {
                                path: path.to_path_buf(),
                                pid: 0,
                            });
                        }
                        owner => {
                            tracing::warn!(
                                path = %path.display(),
                                stale_pid = ?owner,
                                "Reclaiming stale supervisor lock"
                            );
                            match fs::remove_file(path) {
                                Ok(()) => {}
                                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                                Err(e) => return Err(e.into()),
                            }
                        }
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        let owner = read_owner(path).unwrap_or(0);
        Err(SupervisorError::LockContention { path: path.to_path_buf(), pid: owner })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl Drop for PidLock {
    fn drop(&mut self) {
        // Only remove the file if it still names us.
        if read_owner(&self.path) == Some(self.pid) {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// True when the lock file is older than [`UNWRITTEN_GRACE`] or gone.
fn abandoned(path: &Path) -> bool {
    match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(modified) => SystemTime::now()
            .duration_since(modified)
            .is_ok_and(|age| age >= UNWRITTEN_GRACE),
        Err(e) => e.kind() == std::io::ErrorKind::NotFound,
    }
}

fn read_owner(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        // Exists but owned by someone else.
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    // Far above any kernel pid_max.
    const DEAD_PID: u32 = 999_999_999;

    #[test]
    fn test_acquire_writes_pid_and_releases() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("supervisor.lock");
        {
            let lock = PidLock::acquire(&path).unwrap();
            assert_eq!(read_owner(&path), Some(std::process::id()));
            assert_eq!(lock.pid(), std::process::id());
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_live_owner_causes_contention() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("supervisor.lock");
        let _held = PidLock::acquire(&path).unwrap();

        // A different would-be owner sees the live holder.
        let err = PidLock::acquire_as(&path, DEAD_PID).unwrap_err();
        assert!(matches!(err, SupervisorError::LockContention { pid, .. } if pid == std::process::id()));
    }

    #[test]
    fn test_stale_lock_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("supervisor.lock");
        fs::write(&path, format!("{}\n", DEAD_PID)).unwrap();

        let lock = PidLock::acquire(&path).unwrap();
        assert_eq!(read_owner(lock.path()), Some(std::process::id()));
    }

    fn age(path: &Path, by: Duration) {
        let file = OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - by).unwrap();
    }

    #[test]
    fn test_old_garbage_lock_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("supervisor.lock");
        fs::write(&path, "not-a-pid").unwrap();
        age(&path, UNWRITTEN_GRACE + Duration::from_secs(1));
        assert!(PidLock::acquire(&path).is_ok());
    }

    #[test]
    fn test_freshly_created_empty_lock_is_contended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("supervisor.lock");
        fs::write(&path, "").unwrap();

        let err = PidLock::acquire(&path).unwrap_err();
        assert!(matches!(err, SupervisorError::LockContention { pid: 0, .. }));
        assert!(path.exists());
    }
}
