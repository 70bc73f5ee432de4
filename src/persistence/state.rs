//! Owned supervisor state.
//!
//! `SupervisorState` is the single mutable value of the daemon. The loop owns
//! it and lends it to the breaker and controller; nothing else holds a
//! reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Breaker position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    #[default]
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }

    /// Gauge encoding: 0 closed, 1 half-open, 2 open.
    pub fn gauge(&self) -> f64 {
        match self {
            BreakerState::Closed => 0.0,
            BreakerState::HalfOpen => 1.0,
            BreakerState::Open => 2.0,
        }
    }
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-service breaker record. Created on the first observed failure and
/// never removed; an operator reset returns it to `Closed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub service_id: String,
    #[serde(rename = "circuit_breaker_state")]
    pub state: BreakerState,
    #[serde(rename = "failures")]
    pub failure_count: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Always set; `Open` measures its timeout from here.
    pub last_transition_at: DateTime<Utc>,
    pub last_restart_at: Option<DateTime<Utc>>,
    /// Consecutive healthy probes observed while degraded.
    #[serde(default)]
    pub healthy_streak: u32,
}

impl CircuitBreakerState {
    pub fn new(service_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            service_id: service_id.to_string(),
            state: BreakerState::Closed,
            failure_count: 0,
            last_failure_at: None,
            last_transition_at: now,
            last_restart_at: None,
            healthy_streak: 0,
        }
    }
}

/// Aggregate observations carried across cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub dns_reachable: Option<bool>,
    pub vip_present: Option<bool>,
    pub cycles: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorState {
    pub breakers: BTreeMap<String, CircuitBreakerState>,
    pub metrics: AggregateMetrics,
}

impl SupervisorState {
    pub fn breaker(&self, service_id: &str) -> Option<&CircuitBreakerState> {
        self.breakers.get(service_id)
    }

    /// Breaker position, treating an absent record as `Closed`.
    pub fn breaker_state(&self, service_id: &str) -> BreakerState {
        self.breakers
            .get(service_id)
            .map(|b| b.state)
            .unwrap_or_default()
    }

    pub fn failure_count(&self, service_id: &str) -> u32 {
        self.breakers.get(service_id).map(|b| b.failure_count).unwrap_or(0)
    }

    pub(crate) fn breaker_mut(&mut self, service_id: &str) -> Option<&mut CircuitBreakerState> {
        self.breakers.get_mut(service_id)
    }

    pub(crate) fn breaker_entry(
        &mut self,
        service_id: &str,
        now: DateTime<Utc>,
    ) -> &mut CircuitBreakerState {
        self.breakers
            .entry(service_id.to_string())
            .or_insert_with(|| CircuitBreakerState::new(service_id, now))
    }
}
