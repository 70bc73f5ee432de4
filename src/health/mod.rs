//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Per-service probe (probe.rs):
//!     runtime inspect (bounded)
//!     → declared healthcheck
//!     → optional functional DNS query (dns.rs)
//!     → HealthCheckResult (result.rs)
//!
//! Aggregate probe (network.rs):
//!     DNS through the configured resolver (usually the VIP)
//!     + VIP presence on a local interface
//!     → NetworkStatus
//! ```
//!
//! # Design Decisions
//! - Probes are read-only and never return errors; timeouts are `Unhealthy`
//! - `Starting` is a grace verdict, neither failure nor success
//! - DNS probes make at most one retry

pub mod dns;
pub mod network;
pub mod probe;
pub mod result;

pub use network::{LocalNetworkProbe, NetworkProbe, NetworkStatus};
pub use probe::{HealthProbe, ServiceProbe};
pub use result::{HealthCheckResult, ProbeStatus};
