//! Startup orchestration.
//!
//! # Order
//! 1. Acquire the PID lock (contention is fatal)
//! 2. Load persisted state, quarantining an unreadable document
//! 3. Metrics exporter, runtime adapter, supervisor
//! 4. Config watcher and signal handlers
//! 5. Status server (last, so it never serves an unowned state)
//! 6. Loop until shutdown, then release the lock

use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::clock::{Clock, SystemClock};
use crate::config::watcher::ConfigWatcher;
use crate::config::SupervisorConfig;
use crate::error::SupervisorResult;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::{spawn_signal_handler, ReloadTarget};
use crate::observability::metrics;
use crate::persistence::{PidLock, StateStore};
use crate::runtime::{ContainerRuntime, DockerCli};
use crate::status::StatusServer;
use crate::supervisor::{Dependencies, Supervisor};

/// Commands queued from the HTTP admin routes.
const COMMAND_QUEUE: usize = 16;

pub fn local_hostname() -> String {
    gethostname::gethostname().to_string_lossy().into_owned()
}

/// Production collaborators: Docker CLI and the system clock.
pub fn system_dependencies(config: &SupervisorConfig) -> Dependencies {
    let runtime: Arc<dyn ContainerRuntime> = Arc::new(DockerCli::new(&config.runtime, config.probe.timeout()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    Dependencies {
        runtime,
        clock,
        network: None,
        notifier: None,
        hostname: local_hostname(),
    }
}

/// Run the daemon until SIGTERM/SIGINT.
pub async fn run_daemon(config: SupervisorConfig, config_path: Option<PathBuf>) -> SupervisorResult<()> {
    let lock = PidLock::acquire(&config.supervisor.lock_path())?;
    tracing::info!(pid = lock.pid(), path = ?lock.path(), "Supervisor lock acquired");

    let store = StateStore::new(&config.supervisor.state_dir);
    let state = store.load_or_quarantine()?;
    tracing::info!(
        path = ?store.state_path(),
        breakers = state.breakers.len(),
        "Supervisor state loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::warn!(error = %e, "Invalid metrics address, exporter disabled"),
        }
    }

    let supervisor = Supervisor::new(config.clone(), system_dependencies(&config), state, Some(store));

    let shutdown = Arc::new(Shutdown::new());
    let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE);

    let (update_tx, update_rx, _watcher) = match &config_path {
        Some(path) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            let tx = watcher.sender();
            let handle = watcher
                .run()
                .map_err(|e| tracing::warn!(error = %e, "Config watcher unavailable, SIGHUP still reloads"))
                .ok();
            (tx, rx, handle)
        }
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (tx, rx, None)
        }
    };
    let reload = config_path.map(|path| ReloadTarget { path, tx: update_tx });
    spawn_signal_handler(shutdown.clone(), reload)?;

    let server = if config.status.enabled {
        let listener = TcpListener::bind(&config.status.bind_address).await?;
        let server = StatusServer::new(&config.status, supervisor.status_handle(), command_tx.clone());
        let rx = shutdown.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = server.run(listener, rx).await {
                tracing::error!(error = %e, "Status server failed");
            }
        }))
    } else {
        None
    };

    supervisor.run(shutdown.subscribe(), command_rx, update_rx).await;

    if let Some(handle) = server {
        let _ = handle.await;
    }
    drop(command_tx);
    tracing::info!(path = ?lock.path(), "Releasing supervisor lock");
    Ok(())
}
