//! Merged status document.
//!
//! Built by the loop once per cycle, published to the HTTP endpoint through
//! an `ArcSwap`, and written to `status.json` for offline inspection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::clock::elapsed_between;
use crate::config::ServiceConfig;
use crate::health::network::{DnsStatus, NetworkStatus, VipStatus};
use crate::health::{HealthCheckResult, ProbeStatus};
use crate::persistence::state::{BreakerState, SupervisorState};

/// Node-level verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Unhealthy,
    /// No cycle has completed yet.
    Unknown,
}

impl OverallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::Healthy => "healthy",
            OverallStatus::Degraded => "degraded",
            OverallStatus::Unhealthy => "unhealthy",
            OverallStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub id: String,
    pub container: String,
    pub health: Option<ProbeStatus>,
    pub detail: Option<String>,
    pub checked_at: Option<DateTime<Utc>>,
    pub circuit_breaker_state: BreakerState,
    pub failures: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_restart_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub hostname: String,
    pub status: OverallStatus,
    pub generated_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
    pub cycles: u64,
    pub dns: Option<DnsStatus>,
    pub vip: Option<VipStatus>,
    pub services: Vec<ServiceStatus>,
    pub errors: Vec<String>,
}

impl StatusReport {
    /// Placeholder served before the first cycle completes.
    pub fn pending(hostname: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            hostname: hostname.to_string(),
            status: OverallStatus::Unknown,
            generated_at: started_at,
            started_at,
            uptime_secs: 0,
            cycles: 0,
            dns: None,
            vip: None,
            services: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn build(
        hostname: &str,
        started_at: DateTime<Utc>,
        now: DateTime<Utc>,
        services: &[ServiceConfig],
        state: &SupervisorState,
        results: &BTreeMap<String, HealthCheckResult>,
        network: &NetworkStatus,
    ) -> Self {
        let mut errors = Vec::new();
        let services: Vec<ServiceStatus> = services
            .iter()
            .map(|service| {
                let result = results.get(&service.id);
                let breaker = state.breaker(&service.id);
                if let Some(r) = result.filter(|r| r.status == ProbeStatus::Unhealthy) {
                    errors.push(format!("{}: {}", service.id, r.detail));
                }
                ServiceStatus {
                    id: service.id.clone(),
                    container: service.container_name().to_string(),
                    health: result.map(|r| r.status),
                    detail: result.map(|r| r.detail.clone()),
                    checked_at: result.map(|r| r.timestamp),
                    circuit_breaker_state: state.breaker_state(&service.id),
                    failures: state.failure_count(&service.id),
                    last_failure_at: breaker.and_then(|b| b.last_failure_at),
                    last_restart_at: breaker.and_then(|b| b.last_restart_at),
                }
            })
            .collect();

        if let Some(dns) = network.dns.as_ref().filter(|d| !d.reachable) {
            errors.push(format!("dns via {}: {}", dns.resolver, dns.detail));
        }

        let status = overall_status(&services, network);
        Self {
            hostname: hostname.to_string(),
            status,
            generated_at: now,
            started_at,
            uptime_secs: elapsed_between(started_at, now).as_secs(),
            cycles: state.metrics.cycles,
            dns: network.dns.clone(),
            vip: network.vip.clone(),
            services,
            errors,
        }
    }

    /// Whether this node can answer DNS queries.
    pub fn is_ready(&self) -> bool {
        match &self.dns {
            Some(dns) => dns.reachable,
            None => matches!(self.status, OverallStatus::Healthy | OverallStatus::Degraded),
        }
    }

    pub fn service(&self, id: &str) -> Option<&ServiceStatus> {
        self.services.iter().find(|s| s.id == id)
    }
}

/// Unhealthy when DNS is known down or every service is unhealthy; degraded
/// when anything is unhealthy, starting, or behind a non-closed breaker.
/// VIP absence is normal on a backup node and does not count.
pub fn overall_status(services: &[ServiceStatus], network: &NetworkStatus) -> OverallStatus {
    let unhealthy = |s: &ServiceStatus| s.health == Some(ProbeStatus::Unhealthy);

    if network.dns_reachable() == Some(false) {
        return OverallStatus::Unhealthy;
    }
    if !services.is_empty() && services.iter().all(unhealthy) {
        return OverallStatus::Unhealthy;
    }

    let degraded = services.iter().any(|s| {
        s.health != Some(ProbeStatus::Healthy) || s.circuit_breaker_state != BreakerState::Closed
    });
    if degraded {
        OverallStatus::Degraded
    } else {
        OverallStatus::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn dns(reachable: bool) -> NetworkStatus {
        NetworkStatus {
            dns: Some(DnsStatus {
                resolver: SocketAddr::from(([192, 168, 1, 100], 53)),
                domain: "google.com".into(),
                reachable,
                detail: if reachable { "1 answer(s)".into() } else { "timed out".into() },
                latency_ms: reachable.then_some(4),
            }),
            vip: None,
        }
    }

    fn report(verdicts: &[(&str, ProbeStatus)], network: &NetworkStatus, state: &SupervisorState) -> StatusReport {
        let now = Utc::now();
        let services: Vec<ServiceConfig> = verdicts.iter().map(|(id, _)| ServiceConfig::new(*id)).collect();
        let results = verdicts
            .iter()
            .map(|(id, status)| (id.to_string(), HealthCheckResult::new(id, *status, now, "probe")))
            .collect();
        StatusReport::build("dns1", now, now, &services, state, &results, network)
    }

    #[test]
    fn test_all_healthy() {
        let r = report(
            &[("pihole", ProbeStatus::Healthy), ("unbound", ProbeStatus::Healthy)],
            &dns(true),
            &SupervisorState::default(),
        );
        assert_eq!(r.status, OverallStatus::Healthy);
        assert!(r.is_ready());
        assert!(r.errors.is_empty());
    }

    #[test]
    fn test_partial_failure_is_degraded() {
        let r = report(
            &[("pihole", ProbeStatus::Unhealthy), ("unbound", ProbeStatus::Healthy)],
            &dns(true),
            &SupervisorState::default(),
        );
        assert_eq!(r.status, OverallStatus::Degraded);
        assert_eq!(r.errors, vec!["pihole: probe".to_string()]);

        let starting = report(&[("pihole", ProbeStatus::Starting)], &dns(true), &SupervisorState::default());
        assert_eq!(starting.status, OverallStatus::Degraded);
    }

    #[test]
    fn test_open_breaker_is_degraded_even_when_healthy() {
        let mut state = SupervisorState::default();
        state.breaker_entry("pihole", Utc::now()).state = BreakerState::Open;
        let r = report(&[("pihole", ProbeStatus::Healthy)], &dns(true), &state);
        assert_eq!(r.status, OverallStatus::Degraded);
        assert_eq!(r.service("pihole").unwrap().circuit_breaker_state, BreakerState::Open);
    }

    #[test]
    fn test_dns_down_or_everything_down_is_unhealthy() {
        let r = report(&[("pihole", ProbeStatus::Healthy)], &dns(false), &SupervisorState::default());
        assert_eq!(r.status, OverallStatus::Unhealthy);
        assert!(!r.is_ready());
        assert_eq!(r.errors.len(), 1);

        let r = report(
            &[("pihole", ProbeStatus::Unhealthy), ("unbound", ProbeStatus::Unhealthy)],
            &NetworkStatus::default(),
            &SupervisorState::default(),
        );
        assert_eq!(r.status, OverallStatus::Unhealthy);
        assert!(!r.is_ready());
    }

    #[test]
    fn test_pending_report_is_not_ready() {
        let r = StatusReport::pending("dns1", Utc::now());
        assert_eq!(r.status, OverallStatus::Unknown);
        assert!(!r.is_ready());
    }
}
