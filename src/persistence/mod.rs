//! Persistence subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     lock.rs acquires <state_dir>/supervisor.lock (PID, stale reclaim)
//!     → store.rs loads state.json → SupervisorState (state.rs)
//!
//! Every cycle:
//!     SupervisorState → state.json   (write tmp, fsync, rename)
//!     StatusReport    → status.json  (same)
//! ```
//!
//! # Design Decisions
//! - One writer: only the lock holder snapshots
//! - Documents are versioned; newer versions are refused, never guessed at
//! - A crash loses at most one cycle; the next probes re-derive ground truth

pub mod lock;
pub mod state;
pub mod store;

pub use lock::PidLock;
pub use state::{AggregateMetrics, BreakerState, CircuitBreakerState, SupervisorState};
pub use store::StateStore;
