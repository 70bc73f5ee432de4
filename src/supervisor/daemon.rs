//! Long-running loop.
//!
//! Cycles run back to back on a fixed interval. Between cycles the loop
//! waits on three sources: the next tick, operator commands, and
//! configuration reloads. The interval is measured on the injected clock.
//! Shutdown is only observed between cycles; a final snapshot is written
//! before returning.

use tokio::sync::{broadcast, mpsc};

use crate::clock::Clock;
use crate::config::SupervisorConfig;
use crate::supervisor::command::SupervisorCommand;
use crate::supervisor::cycle::Supervisor;

impl Supervisor {
    pub async fn run(
        mut self,
        mut shutdown: broadcast::Receiver<()>,
        mut commands: mpsc::Receiver<SupervisorCommand>,
        mut config_updates: mpsc::UnboundedReceiver<SupervisorConfig>,
    ) {
        tracing::info!(
            services = self.config().services.len(),
            interval_secs = self.config().supervisor.interval_secs,
            "Supervisor loop started"
        );

        let clock = self.clock();
        'cycles: loop {
            let tick = clock.now();
            self.run_cycle().await;
            let interval = chrono::Duration::from_std(self.config().supervisor.interval())
                .unwrap_or(chrono::Duration::zero());
            let next = tick + interval;

            let wait = clock.sleep_until(next);
            tokio::pin!(wait);
            loop {
                tokio::select! {
                    _ = &mut wait => break,
                    _ = shutdown.recv() => break 'cycles,
                    Some(command) = commands.recv() => {
                        tracing::debug!(?command, "Operator command received");
                        self.handle_command(command).await;
                    }
                    Some(config) = config_updates.recv() => self.apply_config(config),
                }
            }
        }

        tracing::info!("Shutdown requested, writing final snapshot");
        self.persist();
        tracing::info!("Supervisor loop stopped");
    }
}
