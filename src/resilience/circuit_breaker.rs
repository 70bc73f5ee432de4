//! Circuit breaker gating automatic restarts.
//!
//! # States
//! - Closed: restarts allowed (subject to cooldown)
//! - Open: restarts suppressed, probing continues
//! - Half-Open: one trial restart allowed
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count reaches max_failures
//! Open → Half-Open: now - last_transition_at >= open_timeout (inclusive)
//! Half-Open → Closed: trial restart settles healthy
//! Half-Open → Open: trial restart still failing (timer restarts)
//! Open/Half-Open → Closed: independent healthy probes (recovery_confirmations in a row)
//! ```
//!
//! # Design Decisions
//! - Per-service breaker (not global)
//! - The breaker owns no state; it operates on the `SupervisorState` it is lent
//! - Failures are counted when a restart is issued, not when a probe fails

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::clock::elapsed_between;
use crate::config::LoopConfig;
use crate::health::ProbeStatus;
use crate::notification::Severity;
use crate::persistence::state::{BreakerState, SupervisorState};

/// Outcome fed back after a recovery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// Why a breaker moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCause {
    ThresholdReached,
    TimeoutElapsed,
    TrialFailed,
    RecoverySucceeded,
    ObservedHealthy,
    OperatorReset,
}

/// A state change, reported so the caller can alert on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub service_id: String,
    pub from: BreakerState,
    pub to: BreakerState,
    pub at: DateTime<Utc>,
    pub failure_count: u32,
    pub cause: TransitionCause,
}

/// Result of [`CircuitBreaker::record`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub state: BreakerState,
    pub transition: Option<Transition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerPolicy {
    pub max_failures: u32,
    pub open_timeout: Duration,
    pub recovery_confirmations: u32,
}

impl From<&LoopConfig> for BreakerPolicy {
    fn from(config: &LoopConfig) -> Self {
        Self {
            max_failures: config.max_restart_attempts,
            open_timeout: config.circuit_breaker_timeout(),
            recovery_confirmations: config.recovery_confirmations.max(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    policy: BreakerPolicy,
}

impl CircuitBreaker {
    pub fn new(policy: BreakerPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &BreakerPolicy {
        &self.policy
    }

    /// True while restarts must be suppressed.
    pub fn is_open(&self, state: &SupervisorState, service_id: &str) -> bool {
        state.breaker_state(service_id) == BreakerState::Open
    }

    /// Time left before an open breaker admits a trial.
    pub fn retry_after(&self, state: &SupervisorState, service_id: &str, now: DateTime<Utc>) -> Option<Duration> {
        let breaker = state.breaker(service_id)?;
        if breaker.state != BreakerState::Open {
            return None;
        }
        let elapsed = elapsed_between(breaker.last_transition_at, now);
        Some(self.policy.open_timeout.saturating_sub(elapsed))
    }

    /// Move an expired `Open` breaker to `HalfOpen`.
    pub fn poll(&self, state: &mut SupervisorState, service_id: &str, now: DateTime<Utc>) -> Option<Transition> {
        let open_timeout = self.policy.open_timeout;
        let breaker = state.breaker_mut(service_id)?;
        if breaker.state != BreakerState::Open {
            return None;
        }
        if elapsed_between(breaker.last_transition_at, now) < open_timeout {
            return None;
        }

        breaker.state = BreakerState::HalfOpen;
        breaker.last_transition_at = now;
        tracing::info!(
            service = %service_id,
            failures = breaker.failure_count,
            "Circuit breaker half-open, next recovery attempt is a trial"
        );
        Some(Transition {
            service_id: service_id.to_string(),
            from: BreakerState::Open,
            to: BreakerState::HalfOpen,
            at: now,
            failure_count: breaker.failure_count,
            cause: TransitionCause::TimeoutElapsed,
        })
    }

    /// Count an in-flight restart before it is issued.
    pub fn record_attempt(&self, state: &mut SupervisorState, service_id: &str, now: DateTime<Utc>) -> u32 {
        let breaker = state.breaker_entry(service_id, now);
        breaker.failure_count = breaker.failure_count.saturating_add(1);
        breaker.last_failure_at = Some(now);
        breaker.last_restart_at = Some(now);
        breaker.healthy_streak = 0;
        breaker.failure_count
    }

    /// Feed the outcome of a controller-initiated attempt.
    ///
    /// Failures were already counted by [`record_attempt`](Self::record_attempt);
    /// here they only decide whether the breaker opens.
    pub fn record(
        &self,
        state: &mut SupervisorState,
        service_id: &str,
        outcome: Outcome,
        now: DateTime<Utc>,
    ) -> Recorded {
        match outcome {
            Outcome::Success => {
                let transition = self.close(state, service_id, now, TransitionCause::RecoverySucceeded);
                Recorded {
                    state: BreakerState::Closed,
                    transition,
                }
            }
            Outcome::Failure => {
                let max_failures = self.policy.max_failures;
                let breaker = state.breaker_entry(service_id, now);
                breaker.last_failure_at = Some(now);
                breaker.healthy_streak = 0;

                let cause = match breaker.state {
                    BreakerState::HalfOpen => Some(TransitionCause::TrialFailed),
                    BreakerState::Closed if breaker.failure_count >= max_failures => {
                        Some(TransitionCause::ThresholdReached)
                    }
                    _ => None,
                };

                let transition = cause.map(|cause| {
                    let from = breaker.state;
                    breaker.state = BreakerState::Open;
                    breaker.last_transition_at = now;
                    tracing::error!(
                        service = %service_id,
                        failures = breaker.failure_count,
                        retry_after_secs = self.policy.open_timeout.as_secs(),
                        "Circuit breaker opened, suspending automatic restarts"
                    );
                    Transition {
                        service_id: service_id.to_string(),
                        from,
                        to: BreakerState::Open,
                        at: now,
                        failure_count: breaker.failure_count,
                        cause,
                    }
                });

                Recorded {
                    state: breaker.state,
                    transition,
                }
            }
        }
    }

    /// Account for an independent probe (one not following a restart).
    ///
    /// An unhealthy verdict creates the record lazily. Healthy verdicts reset
    /// the count of a closed breaker at once, and close a degraded one after
    /// `recovery_confirmations` consecutive healthy probes.
    pub fn observe(
        &self,
        state: &mut SupervisorState,
        service_id: &str,
        status: ProbeStatus,
        now: DateTime<Utc>,
    ) -> Option<Transition> {
        match status {
            ProbeStatus::Unhealthy => {
                let breaker = state.breaker_entry(service_id, now);
                breaker.last_failure_at = Some(now);
                breaker.healthy_streak = 0;
                None
            }
            ProbeStatus::Starting => {
                if let Some(breaker) = state.breaker_mut(service_id) {
                    breaker.healthy_streak = 0;
                }
                None
            }
            ProbeStatus::Healthy => {
                let confirmations = self.policy.recovery_confirmations;
                let breaker = state.breaker_mut(service_id)?;
                if breaker.state == BreakerState::Closed {
                    if breaker.failure_count > 0 {
                        tracing::info!(service = %service_id, failures = breaker.failure_count, "Service healthy again, failure count reset");
                    }
                    breaker.failure_count = 0;
                    breaker.healthy_streak = 0;
                    return None;
                }

                breaker.healthy_streak = breaker.healthy_streak.saturating_add(1);
                if breaker.healthy_streak < confirmations {
                    tracing::info!(
                        service = %service_id,
                        state = %breaker.state,
                        streak = breaker.healthy_streak,
                        needed = confirmations,
                        "Healthy probe while breaker degraded, awaiting confirmation"
                    );
                    return None;
                }
                self.close(state, service_id, now, TransitionCause::ObservedHealthy)
            }
        }
    }

    /// Operator reset: back to `Closed` with a zero count. The cooldown clock
    /// (`last_restart_at`) is kept.
    pub fn reset(&self, state: &mut SupervisorState, service_id: &str, now: DateTime<Utc>) -> Option<Transition> {
        self.close(state, service_id, now, TransitionCause::OperatorReset)
    }

    fn close(
        &self,
        state: &mut SupervisorState,
        service_id: &str,
        now: DateTime<Utc>,
        cause: TransitionCause,
    ) -> Option<Transition> {
        let breaker = state.breaker_mut(service_id)?;
        let from = breaker.state;
        let failures = breaker.failure_count;
        breaker.failure_count = 0;
        breaker.healthy_streak = 0;
        if from == BreakerState::Closed {
            return None;
        }

        breaker.state = BreakerState::Closed;
        breaker.last_transition_at = now;
        tracing::info!(service = %service_id, from = %from, ?cause, "Circuit breaker closed");
        Some(Transition {
            service_id: service_id.to_string(),
            from,
            to: BreakerState::Closed,
            at: now,
            failure_count: failures,
            cause,
        })
    }

    /// Alert for a transition, if it warrants one.
    pub fn alert(&self, transition: &Transition) -> Option<(Severity, String)> {
        let id = &transition.service_id;
        match transition.to {
            BreakerState::Open => {
                let what = match transition.cause {
                    TransitionCause::TrialFailed => "trial restart failed".to_string(),
                    _ => format!("{} restart attempt(s) failed", transition.failure_count),
                };
                Some((
                    Severity::Critical,
                    format!(
                        "{}: circuit breaker OPEN, {}; automatic recovery suspended for {}s",
                        id,
                        what,
                        self.policy.open_timeout.as_secs()
                    ),
                ))
            }
            BreakerState::Closed if transition.from != BreakerState::Closed => {
                let how = match transition.cause {
                    TransitionCause::RecoverySucceeded => "recovered after restart",
                    TransitionCause::OperatorReset => "breaker reset by operator",
                    _ => "recovered without intervention",
                };
                Some((Severity::Recovery, format!("{}: {}, circuit breaker closed", id, how)))
            }
            _ => None,
        }
    }
}
