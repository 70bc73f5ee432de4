//! OS signal handling.
//!
//! # Responsibilities
//! - SIGTERM/SIGINT → graceful shutdown (a second one exits immediately)
//! - SIGHUP → re-read the configuration file
//!
//! Uses Tokio's signal handling, so handlers run as ordinary tasks.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::schema::SupervisorConfig;
use crate::config::watcher::reload_into;
use crate::lifecycle::shutdown::Shutdown;

/// Where SIGHUP sends freshly loaded configuration.
pub struct ReloadTarget {
    pub path: PathBuf,
    pub tx: mpsc::UnboundedSender<SupervisorConfig>,
}

#[cfg(unix)]
pub fn spawn_signal_handler(shutdown: Arc<Shutdown>, reload: Option<ReloadTarget>) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;
    let mut hup = signal(SignalKind::hangup())?;

    Ok(tokio::spawn(async move {
        let mut requested = false;
        loop {
            let name = tokio::select! {
                _ = term.recv() => "SIGTERM",
                _ = int.recv() => "SIGINT",
                _ = hup.recv() => {
                    match &reload {
                        Some(target) => {
                            tracing::info!(path = ?target.path, "SIGHUP received, reloading configuration");
                            reload_into(&target.path, &target.tx);
                        }
                        None => tracing::warn!("SIGHUP received but no configuration file to reload"),
                    }
                    continue;
                }
            };

            if requested {
                tracing::warn!(signal = name, "Second shutdown signal, exiting immediately");
                std::process::exit(130);
            }
            requested = true;
            tracing::info!(signal = name, "Shutdown signal received");
            shutdown.trigger();
        }
    }))
}

#[cfg(not(unix))]
pub fn spawn_signal_handler(shutdown: Arc<Shutdown>, _reload: Option<ReloadTarget>) -> std::io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received");
            shutdown.trigger();
        }
    }))
}
