//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Lock → Load state → Build supervisor → Watchers → Status server → Loop
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Loop finishes its cycle → Final snapshot → Unlock
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Trigger config reload
//! ```
//!
//! # Design Decisions
//! - Fail fast: lock contention and unreadable state directories are fatal
//! - A cycle in progress is never interrupted

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::run_daemon;
