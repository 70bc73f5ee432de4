//! One supervision cycle.
//!
//! # Flow
//! ```text
//! 1. Probe every declared service (declaration order)
//! 2. Feed each verdict to the breaker (streaks, lazy records)
//! 3. For each unhealthy service: dependency gate → RecoveryController
//! 4. Alert on breaker transitions
//! 5. Observe DNS through the VIP and VIP presence
//! 6. Snapshot state, write and publish the status report
//! ```
//!
//! Services are handled one at a time; a cycle never overlaps another.

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::SupervisorConfig;
use crate::health::{HealthCheckResult, HealthProbe, LocalNetworkProbe, NetworkProbe, NetworkStatus, ProbeStatus, ServiceProbe};
use crate::notification::{NotificationDispatcher, Notifier};
use crate::observability::metrics;
use crate::persistence::{StateStore, SupervisorState};
use crate::resilience::{CircuitBreaker, RecoveryController, RecoveryOutcome, Transition};
use crate::runtime::ContainerRuntime;
use crate::status::StatusReport;
use crate::supervisor::command::SupervisorCommand;

/// Collaborators injected into the supervisor.
///
/// `network` and `notifier` are rebuilt from configuration on reload unless
/// supplied here.
pub struct Dependencies {
    pub runtime: Arc<dyn ContainerRuntime>,
    pub clock: Arc<dyn Clock>,
    pub network: Option<Arc<dyn NetworkProbe>>,
    pub notifier: Option<Arc<dyn Notifier>>,
    pub hostname: String,
}

/// What happened to one service during a cycle.
#[derive(Debug, Clone)]
pub struct ServiceReport {
    pub result: HealthCheckResult,
    /// `None` when the service was not unhealthy or recovery is disabled.
    pub recovery: Option<RecoveryOutcome>,
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub services: Vec<ServiceReport>,
    pub transitions: Vec<Transition>,
    pub network: NetworkStatus,
}

impl CycleReport {
    pub fn service(&self, id: &str) -> Option<&ServiceReport> {
        self.services.iter().find(|s| s.result.service_id == id)
    }

    /// Number of restarts issued during the cycle.
    pub fn restarts(&self) -> usize {
        self.services
            .iter()
            .filter(|s| s.recovery.as_ref().is_some_and(|r| r.restarted()))
            .count()
    }
}

pub struct Supervisor {
    config: SupervisorConfig,
    state: SupervisorState,
    breaker: CircuitBreaker,
    controller: RecoveryController,
    probe: Arc<dyn ServiceProbe>,
    runtime: Arc<dyn ContainerRuntime>,
    clock: Arc<dyn Clock>,
    network: Arc<dyn NetworkProbe>,
    network_injected: bool,
    notifier: Arc<dyn Notifier>,
    notifier_injected: bool,
    store: Option<StateStore>,
    status: Arc<ArcSwap<StatusReport>>,
    results: BTreeMap<String, HealthCheckResult>,
    last_network: NetworkStatus,
    hostname: String,
    started_at: DateTime<Utc>,
    recover: bool,
    observed: bool,
}

impl Supervisor {
    /// Build a supervisor around previously loaded state.
    ///
    /// Without a `store` nothing is persisted, which is how the dry-run
    /// check operates alongside a running daemon.
    pub fn new(
        config: SupervisorConfig,
        deps: Dependencies,
        state: SupervisorState,
        store: Option<StateStore>,
    ) -> Self {
        let started_at = deps.clock.now();
        let probe = build_probe(&config, &deps.runtime, &deps.clock);
        let controller = RecoveryController::new(
            deps.runtime.clone(),
            probe.clone(),
            deps.clock.clone(),
            (&config.supervisor).into(),
        );
        let network_injected = deps.network.is_some();
        let network = deps
            .network
            .unwrap_or_else(|| Arc::new(LocalNetworkProbe::from_config(&config)));
        let notifier_injected = deps.notifier.is_some();
        let notifier = deps.notifier.unwrap_or_else(|| {
            Arc::new(NotificationDispatcher::new(&config.notifications, deps.hostname.clone()))
        });
        let status = Arc::new(ArcSwap::from_pointee(StatusReport::pending(&deps.hostname, started_at)));

        Self {
            breaker: CircuitBreaker::new((&config.supervisor).into()),
            config,
            state,
            controller,
            probe,
            runtime: deps.runtime,
            clock: deps.clock,
            network,
            network_injected,
            notifier,
            notifier_injected,
            store,
            status,
            results: BTreeMap::new(),
            last_network: NetworkStatus::default(),
            hostname: deps.hostname,
            started_at,
            recover: true,
            observed: false,
        }
    }

    /// Probe and report only; never restart.
    pub fn without_recovery(mut self) -> Self {
        self.recover = false;
        self
    }

    pub fn state(&self) -> &SupervisorState {
        &self.state
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub(crate) fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Shared handle to the latest published report.
    pub fn status_handle(&self) -> Arc<ArcSwap<StatusReport>> {
        self.status.clone()
    }

    pub fn status(&self) -> Arc<StatusReport> {
        self.status.load_full()
    }

    pub async fn run_cycle(&mut self) -> CycleReport {
        let started_at = self.clock.now();
        let services = self.config.services.clone();
        tracing::debug!(services = services.len(), "Starting supervision cycle");

        let mut results = Vec::with_capacity(services.len());
        for service in &services {
            let result = self.probe.check(service).await;
            metrics::record_probe(&service.id, result.status.as_str());
            match result.status {
                ProbeStatus::Healthy => {
                    tracing::debug!(service = %service.id, detail = %result.detail, "Service healthy")
                }
                ProbeStatus::Starting => {
                    tracing::info!(service = %service.id, detail = %result.detail, "Service starting, grace period")
                }
                ProbeStatus::Unhealthy => {
                    tracing::warn!(service = %service.id, detail = %result.detail, "Service unhealthy")
                }
            }
            results.push(result);
        }

        let down: HashSet<&str> = results
            .iter()
            .filter(|r| r.status == ProbeStatus::Unhealthy)
            .map(|r| r.service_id.as_str())
            .collect();

        let mut reports = Vec::with_capacity(services.len());
        let mut transitions = Vec::new();
        for (service, result) in services.iter().zip(results.iter()) {
            let mut changed = Vec::new();
            changed.extend(self.breaker.observe(&mut self.state, &service.id, result.status, result.timestamp));

            let mut latest = result.clone();
            let recovery = if result.status == ProbeStatus::Unhealthy && self.recover {
                let blocked_by = service.depends_on.iter().find(|dep| down.contains(dep.as_str()));
                Some(match blocked_by {
                    Some(dependency) => {
                        tracing::info!(
                            service = %service.id,
                            dependency = %dependency,
                            "Recovery deferred, dependency unhealthy"
                        );
                        RecoveryOutcome::DependencyDown {
                            dependency: dependency.clone(),
                        }
                    }
                    None => {
                        let report = self.controller.on_unhealthy(&mut self.state, &self.breaker, service).await;
                        changed.extend(report.transitions);
                        if let Some(settled) = report.settled {
                            latest = settled;
                        }
                        report.outcome
                    }
                })
            } else {
                None
            };

            self.alert(&changed).await;
            metrics::record_breaker_state(&service.id, self.state.breaker_state(&service.id));
            self.results.insert(service.id.clone(), latest.clone());
            transitions.extend(changed);
            reports.push(ServiceReport {
                result: latest,
                recovery,
            });
        }

        let network = self.network.observe().await;
        if network.dns_reachable() == Some(false) {
            tracing::warn!(
                detail = network.dns.as_ref().map(|d| d.detail.as_str()).unwrap_or_default(),
                "DNS not resolving through configured resolver"
            );
        }
        metrics::record_network(network.dns_reachable(), network.vip_present());
        self.state.metrics.dns_reachable = network.dns_reachable();
        self.state.metrics.vip_present = network.vip_present();
        self.state.metrics.cycles += 1;
        self.state.metrics.last_cycle_at = Some(self.clock.now());
        self.last_network = network.clone();
        self.observed = true;
        metrics::record_cycle();

        self.persist();

        let report = CycleReport {
            started_at,
            services: reports,
            transitions,
            network,
        };
        tracing::info!(
            status = self.status.load().status.as_str(),
            restarts = report.restarts(),
            transitions = report.transitions.len(),
            "Supervision cycle complete"
        );
        report
    }

    /// Apply an operator command. Unknown service ids are logged and ignored.
    pub async fn handle_command(&mut self, command: SupervisorCommand) {
        match command {
            SupervisorCommand::ResetBreaker { service } => {
                let now = self.clock.now();
                let ids: Vec<String> = match service {
                    Some(id) if self.config.service(&id).is_some() || self.state.breaker(&id).is_some() => vec![id],
                    Some(id) => {
                        tracing::warn!(service = %id, "Reset requested for unknown service");
                        return;
                    }
                    None => self.state.breakers.keys().cloned().collect(),
                };

                let mut changed = Vec::new();
                for id in &ids {
                    changed.extend(self.breaker.reset(&mut self.state, id, now));
                    metrics::record_breaker_state(id, self.state.breaker_state(id));
                }
                tracing::info!(services = ?ids, closed = changed.len(), "Circuit breakers reset by operator");
                self.alert(&changed).await;
                self.persist();
            }
        }
    }

    /// Swap in a new configuration between cycles. Breaker records are
    /// kept, including those of services no longer declared.
    pub fn apply_config(&mut self, config: SupervisorConfig) {
        if config == self.config {
            tracing::debug!("Configuration unchanged, ignoring reload");
            return;
        }

        self.breaker = CircuitBreaker::new((&config.supervisor).into());
        self.probe = build_probe(&config, &self.runtime, &self.clock);
        self.controller = RecoveryController::new(
            self.runtime.clone(),
            self.probe.clone(),
            self.clock.clone(),
            (&config.supervisor).into(),
        );
        if !self.network_injected {
            self.network = Arc::new(LocalNetworkProbe::from_config(&config));
        }
        if !self.notifier_injected {
            self.notifier = Arc::new(NotificationDispatcher::new(&config.notifications, self.hostname.clone()));
        }
        if config.supervisor.state_dir != self.config.supervisor.state_dir {
            tracing::warn!("state_dir changes take effect after restart");
        }

        tracing::info!(
            services = config.services.len(),
            interval_secs = config.supervisor.interval_secs,
            max_restart_attempts = config.supervisor.max_restart_attempts,
            "Configuration reloaded"
        );
        self.config = config;
    }

    /// Write state, then rebuild and publish the status report.
    /// Persistence failures are logged; the loop carries on in memory.
    ///
    /// Until this supervisor has run a cycle it has no probe results, so
    /// only state is written and the existing status document stays the
    /// best-known one.
    pub fn persist(&mut self) {
        self.snapshot_state();
        if self.observed {
            self.publish_status();
        }
    }

    /// Write `state.json`.
    pub fn snapshot_state(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.snapshot(&self.state, self.clock.now()) {
                tracing::error!(error = %e, "Failed to persist supervisor state");
            }
        }
    }

    /// Rebuild the status report, write `status.json` and publish it.
    pub fn publish_status(&mut self) {
        let report = StatusReport::build(
            &self.hostname,
            self.started_at,
            self.clock.now(),
            &self.config.services,
            &self.state,
            &self.results,
            &self.last_network,
        );
        if let Some(store) = &self.store {
            if let Err(e) = store.write_status(&report) {
                tracing::warn!(error = %e, "Failed to write status document");
            }
        }
        self.status.store(Arc::new(report));
    }

    async fn alert(&self, transitions: &[Transition]) {
        for transition in transitions {
            if let Some((severity, message)) = self.breaker.alert(transition) {
                self.notifier.notify(severity, &message).await;
            }
        }
    }
}

fn build_probe(
    config: &SupervisorConfig,
    runtime: &Arc<dyn ContainerRuntime>,
    clock: &Arc<dyn Clock>,
) -> Arc<dyn ServiceProbe> {
    Arc::new(HealthProbe::new(
        runtime.clone(),
        clock.clone(),
        config.probe.timeout(),
        config.probe.dns_retries,
        config.dns.test_domain.clone(),
    ))
}
