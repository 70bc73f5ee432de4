//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Service probed unhealthy:
//!     → recovery.rs (cooldown, restart, settle, re-probe)
//!     → circuit_breaker.rs (count attempts, open after threshold)
//!     → Transition (handed back to the loop for alerting)
//! ```
//!
//! # Design Decisions
//! - Circuit breaker is per service and stops restart storms
//! - Cooldown applies regardless of breaker position
//! - Neither component holds state; both borrow `SupervisorState`

pub mod circuit_breaker;
pub mod recovery;

pub use circuit_breaker::{BreakerPolicy, CircuitBreaker, Outcome, Transition, TransitionCause};
pub use recovery::{RecoveryController, RecoveryOutcome, RecoveryPolicy, RecoveryReport};
