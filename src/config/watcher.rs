//! Hot reload of the configuration file.
//!
//! The parent directory is watched rather than the file itself: editors and
//! config management replace the file by rename, which would orphan a watch
//! on the old inode. Events for other names in the directory are ignored,
//! and a burst of events from one save is coalesced into a single reload.

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::SupervisorConfig;

/// Quiet period after the last event before the file is read.
pub const RELOAD_DEBOUNCE: Duration = Duration::from_millis(250);

/// Watches one configuration file and delivers each valid new version.
pub struct ConfigWatcher {
    path: PathBuf,
    debounce: Duration,
    update_tx: mpsc::UnboundedSender<SupervisorConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiver the supervisor loop reads.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<SupervisorConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            debounce: RELOAD_DEBOUNCE,
            update_tx,
        };
        (watcher, update_rx)
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Sender for out-of-band reloads (SIGHUP).
    pub fn sender(&self) -> mpsc::UnboundedSender<SupervisorConfig> {
        self.update_tx.clone()
    }

    /// Start watching. Must be called inside a tokio runtime; the returned
    /// handle stops the watch when dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let name: OsString = self
            .path
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| notify::Error::generic("configuration path has no file name"))?;

        let (signal_tx, signal_rx) = mpsc::unbounded_channel::<()>();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if touches(&event, &name) => {
                    let _ = signal_tx.send(());
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tokio::spawn(debounce_reloads(self.path.clone(), self.debounce, signal_rx, self.update_tx));

        tracing::info!(path = %self.path.display(), dir = %dir.display(), "Config watcher started");
        Ok(watcher)
    }
}

fn touches(event: &Event, name: &OsString) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event.paths.iter().any(|p| p.file_name() == Some(name.as_os_str()))
}

async fn debounce_reloads(
    path: PathBuf,
    debounce: Duration,
    mut signals: mpsc::UnboundedReceiver<()>,
    tx: mpsc::UnboundedSender<SupervisorConfig>,
) {
    while signals.recv().await.is_some() {
        // Keep absorbing events until the file has been quiet for a while.
        loop {
            match tokio::time::timeout(debounce, signals.recv()).await {
                Ok(Some(())) => continue,
                Ok(None) => return,
                Err(_) => break,
            }
        }
        tracing::info!(path = %path.display(), "Config file changed, reloading");
        reload_into(&path, &tx);
        if tx.is_closed() {
            return;
        }
    }
}

/// Load `path` and forward the result. Invalid files keep the running config.
pub fn reload_into(path: &Path, tx: &mpsc::UnboundedSender<SupervisorConfig>) {
    match load_config(Some(path)) {
        Ok(new_config) => {
            let _ = tx.send(new_config);
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    async fn next_config(rx: &mut mpsc::UnboundedReceiver<SupervisorConfig>) -> SupervisorConfig {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no reload within 5s")
            .expect("channel closed")
    }

    async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<SupervisorConfig>) {
        let extra = tokio::time::timeout(Duration::from_millis(600), rx.recv()).await;
        assert!(extra.is_err(), "unexpected extra reload");
    }

    #[tokio::test]
    async fn test_rewrite_delivers_one_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("supervisor.toml");
        fs::write(&path, "[probe]\ntimeout_ms = 1000\n").unwrap();

        let (watcher, mut rx) = ConfigWatcher::new(&path);
        let _handle = watcher.with_debounce(Duration::from_millis(100)).run().unwrap();

        fs::write(&path, "[probe]\ntimeout_ms = 2500\n").unwrap();
        assert_eq!(next_config(&mut rx).await.probe.timeout_ms, 2500);
        assert_quiet(&mut rx).await;
    }

    #[tokio::test]
    async fn test_reload_survives_atomic_replace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("supervisor.toml");
        fs::write(&path, "[probe]\ntimeout_ms = 1000\n").unwrap();

        let (watcher, mut rx) = ConfigWatcher::new(&path);
        let _handle = watcher.with_debounce(Duration::from_millis(100)).run().unwrap();

        for timeout_ms in [1500u64, 3000] {
            let staged = dir.path().join(".supervisor.toml.tmp");
            fs::write(&staged, format!("[probe]\ntimeout_ms = {}\n", timeout_ms)).unwrap();
            fs::rename(&staged, &path).unwrap();
            assert_eq!(next_config(&mut rx).await.probe.timeout_ms, timeout_ms);
        }
        assert_quiet(&mut rx).await;
    }

    #[tokio::test]
    async fn test_invalid_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("supervisor.toml");
        fs::write(&path, "[probe]\ntimeout_ms = 1000\n").unwrap();

        let (watcher, mut rx) = ConfigWatcher::new(&path);
        let _handle = watcher.with_debounce(Duration::from_millis(100)).run().unwrap();

        fs::write(&path, "[probe]\ntimeout_ms = 0\n").unwrap();
        assert_quiet(&mut rx).await;

        // Unrelated files in the directory are ignored.
        fs::write(dir.path().join("other.toml"), "x = 1\n").unwrap();
        assert_quiet(&mut rx).await;
    }
}
