//! Shared fakes for supervisor integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Semaphore;

use dns_ha_supervisor::clock::{Clock, ManualClock};
use dns_ha_supervisor::config::ServiceConfig;
use dns_ha_supervisor::health::network::DnsStatus;
use dns_ha_supervisor::health::{NetworkProbe, NetworkStatus};
use dns_ha_supervisor::notification::{Notifier, Severity};
use dns_ha_supervisor::persistence::{StateStore, SupervisorState};
use dns_ha_supervisor::runtime::{ContainerRuntime, ContainerState, DeclaredHealth, RuntimeError};
use dns_ha_supervisor::supervisor::{Dependencies, Supervisor};
use dns_ha_supervisor::SupervisorConfig;

pub const INTERVAL: Duration = Duration::from_secs(60);

/// Container runtime whose containers are set by the test.
pub struct FakeRuntime {
    clock: Arc<ManualClock>,
    states: Mutex<HashMap<String, ContainerState>>,
    heal_on_restart: Mutex<HashSet<String>>,
    refuse_restart: Mutex<HashSet<String>>,
    restarts: Mutex<Vec<(String, DateTime<Utc>)>>,
}

impl FakeRuntime {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            states: Mutex::new(HashMap::new()),
            heal_on_restart: Mutex::new(HashSet::new()),
            refuse_restart: Mutex::new(HashSet::new()),
            restarts: Mutex::new(Vec::new()),
        }
    }

    pub fn set(&self, name: &str, state: ContainerState) {
        self.states.lock().unwrap().insert(name.to_string(), state);
    }

    pub fn set_healthy(&self, name: &str) {
        self.set(name, ContainerState::Running { health: Some(DeclaredHealth::Healthy) });
    }

    pub fn set_unhealthy(&self, name: &str) {
        self.set(name, ContainerState::Running { health: Some(DeclaredHealth::Unhealthy) });
    }

    pub fn set_starting(&self, name: &str) {
        self.set(name, ContainerState::Running { health: Some(DeclaredHealth::Starting) });
    }

    /// Whether a restart of `name` makes it healthy.
    pub fn heal_on_restart(&self, name: &str, heals: bool) {
        let mut set = self.heal_on_restart.lock().unwrap();
        if heals {
            set.insert(name.to_string());
        } else {
            set.remove(name);
        }
    }

    pub fn refuse_restarts(&self, name: &str) {
        self.refuse_restart.lock().unwrap().insert(name.to_string());
    }

    pub fn restarts_of(&self, name: &str) -> Vec<DateTime<Utc>> {
        self.restarts
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn total_restarts(&self) -> usize {
        self.restarts.lock().unwrap().len()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn inspect(&self, name: &str) -> Result<ContainerState, RuntimeError> {
        Ok(self
            .states
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or(ContainerState::Missing))
    }

    async fn restart(&self, name: &str) -> Result<(), RuntimeError> {
        self.restarts.lock().unwrap().push((name.to_string(), self.clock.now()));
        if self.refuse_restart.lock().unwrap().contains(name) {
            return Err(RuntimeError::CommandFailed {
                code: Some(1),
                stderr: format!("Error response from daemon: cannot restart {}", name),
            });
        }
        if self.heal_on_restart.lock().unwrap().contains(name) {
            self.set_healthy(name);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(Severity, String)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(Severity, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.sent.lock().unwrap().iter().filter(|(s, _)| *s == severity).count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, severity: Severity, message: &str) {
        self.sent.lock().unwrap().push((severity, message.to_string()));
    }
}

#[derive(Default)]
pub struct FakeNetworkProbe {
    status: Mutex<NetworkStatus>,
}

impl FakeNetworkProbe {
    pub fn set_dns(&self, reachable: bool) {
        self.status.lock().unwrap().dns = Some(DnsStatus {
            resolver: "192.168.1.100:53".parse().unwrap(),
            domain: "google.com".into(),
            reachable,
            detail: if reachable { "1 answer(s)".into() } else { "timed out".into() },
            latency_ms: reachable.then_some(3),
        });
    }
}

#[async_trait]
impl NetworkProbe for FakeNetworkProbe {
    async fn observe(&self) -> NetworkStatus {
        self.status.lock().unwrap().clone()
    }
}

/// Shares a [`ManualClock`], but the wait between cycles only ends once the
/// test calls [`step`](Self::step).
pub struct SteppedClock {
    inner: ManualClock,
    steps: Semaphore,
}

impl SteppedClock {
    pub fn new(inner: ManualClock) -> Self {
        Self {
            inner,
            steps: Semaphore::new(0),
        }
    }

    /// Release one pending inter-cycle wait.
    pub fn step(&self) {
        self.steps.add_permits(1);
    }
}

#[async_trait]
impl Clock for SteppedClock {
    fn now(&self) -> DateTime<Utc> {
        self.inner.now()
    }

    async fn sleep(&self, duration: Duration) {
        self.inner.sleep(duration).await;
    }

    async fn sleep_until(&self, deadline: DateTime<Utc>) {
        if let Ok(permit) = self.steps.acquire().await {
            permit.forget();
        }
        self.inner.sleep_until(deadline).await;
    }
}

/// One node: fakes, a manual clock, and a state directory.
pub struct Node {
    pub clock: Arc<ManualClock>,
    pub runtime: Arc<FakeRuntime>,
    pub notifier: Arc<RecordingNotifier>,
    pub network: Arc<FakeNetworkProbe>,
    pub dir: TempDir,
    pub config: SupervisorConfig,
}

impl Node {
    pub fn new(services: &[&str]) -> Self {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()));
        let runtime = Arc::new(FakeRuntime::new(clock.clone()));
        for id in services {
            runtime.set_healthy(id);
        }
        let network = Arc::new(FakeNetworkProbe::default());
        network.set_dns(true);
        let dir = TempDir::new().unwrap();

        let mut config = SupervisorConfig::default();
        config.supervisor.interval_secs = INTERVAL.as_secs();
        config.supervisor.max_restart_attempts = 3;
        config.supervisor.restart_cooldown_secs = 60;
        config.supervisor.circuit_breaker_timeout_secs = 300;
        config.supervisor.settle_secs = 10;
        config.supervisor.recovery_confirmations = 2;
        config.supervisor.state_dir = dir.path().to_path_buf();
        config.status.enabled = false;
        config.services = services.iter().map(|id| ServiceConfig::new(*id)).collect();

        Self {
            clock,
            runtime,
            notifier: Arc::new(RecordingNotifier::default()),
            network,
            dir,
            config,
        }
    }

    pub fn store(&self) -> StateStore {
        StateStore::new(self.dir.path())
    }

    fn dependencies(&self, clock: Arc<dyn Clock>) -> Dependencies {
        Dependencies {
            runtime: self.runtime.clone(),
            clock,
            network: Some(self.network.clone()),
            notifier: Some(self.notifier.clone()),
            hostname: "dns1".into(),
        }
    }

    /// Supervisor resuming from whatever is on disk.
    pub fn supervisor(&self) -> Supervisor {
        self.supervisor_on(self.clock.clone())
    }

    /// As [`supervisor`](Self::supervisor), reading time from `clock`.
    pub fn supervisor_on(&self, clock: Arc<dyn Clock>) -> Supervisor {
        let store = self.store();
        let state = store.load_or_quarantine().unwrap();
        Supervisor::new(self.config.clone(), self.dependencies(clock), state, Some(store))
    }

    pub fn supervisor_with(&self, state: SupervisorState) -> Supervisor {
        Supervisor::new(
            self.config.clone(),
            self.dependencies(self.clock.clone()),
            state,
            Some(self.store()),
        )
    }

    /// Advance to the next tick.
    pub fn tick(&self) {
        self.clock.advance(INTERVAL);
    }
}
