//! Status reporting.
//!
//! # Data Flow
//! ```text
//! Supervisor cycle
//!     → report.rs (StatusReport built from state + last verdicts + network)
//!     → ArcSwap (lock-free publish)
//!     → server.rs (GET /live /ready /health /health/detailed /status)
//!     → status.json (offline inspection via `dns-ha-supervisor status`)
//! ```

pub mod auth;
pub mod handlers;
pub mod report;
pub mod server;

pub use report::{OverallStatus, ServiceStatus, StatusReport};
pub use server::{build_router, StatusServer, StatusState};
