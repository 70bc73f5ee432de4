//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the supervisor.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for the supervisor.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Loop timing and breaker thresholds.
    pub supervisor: LoopConfig,

    /// Per-probe deadlines.
    pub probe: ProbeConfig,

    /// Container runtime settings.
    pub runtime: RuntimeConfig,

    /// Aggregate DNS reachability probe.
    pub dns: DnsConfig,

    /// Virtual IP observation.
    pub vip: VipConfig,

    /// Monitored services, probed in declaration order.
    pub services: Vec<ServiceConfig>,

    /// Alert sinks.
    pub notifications: NotificationConfig,

    /// HTTP status endpoint.
    pub status: StatusConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl SupervisorConfig {
    /// Look up a monitored service by id.
    pub fn service(&self, id: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.id == id)
    }
}

/// Supervisor loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoopConfig {
    /// Seconds between cycles (`HEALTH_CHECK_INTERVAL`).
    pub interval_secs: u64,

    /// Failed attempts before the breaker opens (`MAX_RESTART_ATTEMPTS`).
    pub max_restart_attempts: u32,

    /// Minimum seconds between two restarts of one service (`RESTART_COOLDOWN`).
    pub restart_cooldown_secs: u64,

    /// Seconds an open breaker waits before a trial (`CIRCUIT_BREAKER_TIMEOUT`).
    pub circuit_breaker_timeout_secs: u64,

    /// Seconds to wait after a restart before re-probing.
    pub settle_secs: u64,

    /// Consecutive healthy probes needed to close a degraded breaker
    /// without a controller-initiated restart.
    pub recovery_confirmations: u32,

    /// Directory holding `state.json` and `status.json`.
    pub state_dir: PathBuf,

    /// Lock file path. Defaults to `<state_dir>/supervisor.lock`.
    pub lock_file: Option<PathBuf>,
}

impl LoopConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn restart_cooldown(&self) -> Duration {
        Duration::from_secs(self.restart_cooldown_secs)
    }

    pub fn circuit_breaker_timeout(&self) -> Duration {
        Duration::from_secs(self.circuit_breaker_timeout_secs)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.lock_file
            .clone()
            .unwrap_or_else(|| self.state_dir.join("supervisor.lock"))
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            max_restart_attempts: 3,
            restart_cooldown_secs: 300,
            circuit_breaker_timeout_secs: 300,
            settle_secs: 10,
            recovery_confirmations: 2,
            state_dir: PathBuf::from("/var/lib/dns-ha-supervisor"),
            lock_file: None,
        }
    }
}

/// Probe deadlines.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ProbeConfig {
    /// Deadline for a single runtime query or DNS attempt, in milliseconds.
    pub timeout_ms: u64,

    /// Extra DNS attempts after the first one fails.
    pub dns_retries: u32,
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 3000,
            dns_retries: 1,
        }
    }
}

/// Container runtime configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Docker CLI binary.
    pub docker_bin: String,

    /// Deadline for `docker restart`, in seconds.
    pub restart_timeout_secs: u64,

    /// Grace period passed to `docker restart -t`.
    pub stop_grace_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            docker_bin: "docker".to_string(),
            restart_timeout_secs: 30,
            stop_grace_secs: 10,
        }
    }
}

/// Aggregate DNS probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DnsConfig {
    /// Probe end-to-end resolution each cycle.
    pub enabled: bool,

    /// Resolver to query, usually the VIP (e.g., "192.168.8.255:53").
    pub resolver: SocketAddr,

    /// Known-good domain.
    pub test_domain: String,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            resolver: SocketAddr::from(([127, 0, 0, 1], 53)),
            test_domain: "google.com".to_string(),
        }
    }
}

/// Virtual IP observation. Read-only: the supervisor never moves the VIP.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct VipConfig {
    pub address: Option<IpAddr>,
}

/// A monitored service.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ServiceConfig {
    /// Stable identifier used in state, status and alerts.
    pub id: String,

    /// Runtime container name (defaults to `id`).
    #[serde(default)]
    pub container: Option<String>,

    /// Functional DNS check for DNS-serving components.
    #[serde(default)]
    pub dns_check: Option<DnsCheckConfig>,

    /// Services this one relies on. Recovery is deferred while any of them is down.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl ServiceConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            container: None,
            dns_check: None,
            depends_on: Vec::new(),
        }
    }

    pub fn container_name(&self) -> &str {
        self.container.as_deref().unwrap_or(&self.id)
    }
}

/// Functional DNS check against one service.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DnsCheckConfig {
    /// Address the service answers on (e.g., "172.20.0.2:53").
    pub address: SocketAddr,

    /// Domain to resolve (defaults to `dns.test_domain`).
    #[serde(default)]
    pub domain: Option<String>,
}

/// Notification sink configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct NotificationConfig {
    /// Webhooks receiving the JSON alert payload.
    pub webhook_urls: Vec<String>,

    /// Messaging relay (ntfy/gotify-style) receiving a text payload.
    pub relay_url: Option<String>,

    /// Bearer token for the relay.
    pub relay_token: Option<String>,

    /// Per-POST deadline in seconds.
    pub timeout_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_urls: Vec::new(),
            relay_url: None,
            relay_token: None,
            timeout_secs: 5,
        }
    }
}

/// Status endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StatusConfig {
    /// Serve the HTTP status endpoint.
    pub enabled: bool,

    /// Bind address (the health service historically listened on 8888).
    pub bind_address: String,

    /// Bearer token for admin routes. Admin routes are disabled when unset.
    pub admin_token: Option<String>,

    /// Per-request deadline in seconds.
    pub request_timeout_secs: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1:8888".to_string(),
            admin_token: None,
            request_timeout_secs: 5,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Prometheus endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9099".to_string(),
        }
    }
}
