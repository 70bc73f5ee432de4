//! Recovery of a service that probed unhealthy.
//!
//! # Flow
//! ```text
//! on_unhealthy(service)
//!     → breaker.poll            (Open may have expired into HalfOpen)
//!     → breaker open?           → Suppressed
//!     → inside cooldown?        → CoolingDown
//!     → breaker.record_attempt  (count before restarting)
//!     → runtime.restart         → error: RestartFailed, breaker.record(Failure)
//!     → clock.sleep(settle)
//!     → probe.check             → Recovered / StillFailing, breaker.record(..)
//! ```
//!
//! The controller never retries a restart within one invocation.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{elapsed_between, Clock};
use crate::config::{LoopConfig, ServiceConfig};
use crate::error::SupervisorError;
use crate::health::{HealthCheckResult, ServiceProbe};
use crate::observability::metrics;
use crate::persistence::state::SupervisorState;
use crate::resilience::circuit_breaker::{CircuitBreaker, Outcome, Transition};
use crate::runtime::ContainerRuntime;

/// What a recovery invocation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Breaker open; no action.
    Suppressed { retry_after: Duration },
    /// A restart was issued too recently.
    CoolingDown { remaining: Duration },
    /// A dependency was unhealthy in the same cycle; no action, no count.
    DependencyDown { dependency: String },
    /// Restarted and settled healthy.
    Recovered,
    /// Restarted but still not healthy after settling.
    StillFailing { detail: String },
    /// The runtime refused or failed the restart.
    RestartFailed { error: String },
}

impl RecoveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryOutcome::Suppressed { .. } => "suppressed",
            RecoveryOutcome::CoolingDown { .. } => "cooling_down",
            RecoveryOutcome::DependencyDown { .. } => "dependency_down",
            RecoveryOutcome::Recovered => "recovered",
            RecoveryOutcome::StillFailing { .. } => "still_failing",
            RecoveryOutcome::RestartFailed { .. } => "restart_failed",
        }
    }

    /// Whether a restart was issued.
    pub fn restarted(&self) -> bool {
        matches!(
            self,
            RecoveryOutcome::Recovered | RecoveryOutcome::StillFailing { .. } | RecoveryOutcome::RestartFailed { .. }
        )
    }
}

#[derive(Debug, Clone)]
pub struct RecoveryReport {
    pub outcome: RecoveryOutcome,
    /// Breaker transitions caused by this invocation, in order.
    pub transitions: Vec<Transition>,
    /// Probe taken after the settle wait, if a restart went through.
    pub settled: Option<HealthCheckResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryPolicy {
    pub cooldown: Duration,
    pub settle: Duration,
}

impl From<&LoopConfig> for RecoveryPolicy {
    fn from(config: &LoopConfig) -> Self {
        Self {
            cooldown: config.restart_cooldown(),
            settle: config.settle(),
        }
    }
}

pub struct RecoveryController {
    runtime: Arc<dyn ContainerRuntime>,
    probe: Arc<dyn ServiceProbe>,
    clock: Arc<dyn Clock>,
    policy: RecoveryPolicy,
}

impl RecoveryController {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        probe: Arc<dyn ServiceProbe>,
        clock: Arc<dyn Clock>,
        policy: RecoveryPolicy,
    ) -> Self {
        Self {
            runtime,
            probe,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &RecoveryPolicy {
        &self.policy
    }

    /// Cooldown left for a service, measured from its last restart.
    pub fn cooldown_remaining(
        &self,
        state: &SupervisorState,
        service_id: &str,
        now: DateTime<Utc>,
    ) -> Option<Duration> {
        let last = state.breaker(service_id)?.last_restart_at?;
        let elapsed = elapsed_between(last, now);
        (elapsed < self.policy.cooldown).then(|| self.policy.cooldown - elapsed)
    }

    pub async fn on_unhealthy(
        &self,
        state: &mut SupervisorState,
        breaker: &CircuitBreaker,
        service: &ServiceConfig,
    ) -> RecoveryReport {
        let id = service.id.as_str();
        let now = self.clock.now();
        let mut transitions = Vec::new();

        if let Some(t) = breaker.poll(state, id, now) {
            transitions.push(t);
        }

        if breaker.is_open(state, id) {
            let retry_after = breaker.retry_after(state, id, now).unwrap_or_default();
            tracing::warn!(
                service = %id,
                retry_after_secs = retry_after.as_secs(),
                "Restart suppressed, circuit breaker open"
            );
            return RecoveryReport {
                outcome: RecoveryOutcome::Suppressed { retry_after },
                transitions,
                settled: None,
            };
        }

        if let Some(remaining) = self.cooldown_remaining(state, id, now) {
            tracing::info!(
                service = %id,
                remaining_secs = remaining.as_secs(),
                "Restart deferred, cooldown active"
            );
            return RecoveryReport {
                outcome: RecoveryOutcome::CoolingDown { remaining },
                transitions,
                settled: None,
            };
        }

        let attempt = breaker.record_attempt(state, id, now);
        tracing::warn!(
            service = %id,
            container = %service.container_name(),
            attempt,
            max_attempts = breaker.policy().max_failures,
            breaker = %state.breaker_state(id),
            "Restarting unhealthy service"
        );

        if let Err(source) = self.runtime.restart(service.container_name()).await {
            let err = SupervisorError::RestartActionFailed {
                service: id.to_string(),
                source,
            };
            tracing::error!(service = %id, error = %err, "Restart action failed");
            metrics::record_restart(id, "error");
            let recorded = breaker.record(state, id, Outcome::Failure, self.clock.now());
            transitions.extend(recorded.transition);
            return RecoveryReport {
                outcome: RecoveryOutcome::RestartFailed { error: err.to_string() },
                transitions,
                settled: None,
            };
        }

        self.clock.sleep(self.policy.settle).await;
        let settled = self.probe.check(service).await;
        let at = self.clock.now();

        let outcome = if settled.healthy {
            tracing::info!(service = %id, detail = %settled.detail, "Service recovered after restart");
            metrics::record_restart(id, "recovered");
            transitions.extend(breaker.record(state, id, Outcome::Success, at).transition);
            RecoveryOutcome::Recovered
        } else {
            tracing::warn!(
                service = %id,
                status = %settled.status,
                detail = %settled.detail,
                "Service still unhealthy after restart"
            );
            metrics::record_restart(id, "still_failing");
            transitions.extend(breaker.record(state, id, Outcome::Failure, at).transition);
            RecoveryOutcome::StillFailing {
                detail: settled.detail.clone(),
            }
        };

        RecoveryReport {
            outcome,
            transitions,
            settled: Some(settled),
        }
    }
}
