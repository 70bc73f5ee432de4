//! Self-healing supervisor for a highly available home-lab DNS stack
//! (Pi-hole, Unbound, Keepalived).
//!
//! Probes each container, restarts the unhealthy ones behind a per-service
//! circuit breaker, and publishes a merged status report.

pub mod clock;
pub mod config;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod notification;
pub mod observability;
pub mod persistence;
pub mod resilience;
pub mod runtime;
pub mod status;
pub mod supervisor;

pub use config::schema::SupervisorConfig;
pub use error::{SupervisorError, SupervisorResult};
pub use lifecycle::Shutdown;
pub use supervisor::Supervisor;
