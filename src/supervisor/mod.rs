//! Supervision loop.
//!
//! # Data Flow
//! ```text
//! tick ─→ cycle.rs (probe → breaker → recovery → alert → persist → publish)
//!           ↑
//! daemon.rs: select { tick, operator command, config reload, shutdown }
//! ```
//!
//! # Design Decisions
//! - The loop is the only owner of `SupervisorState`
//! - Single-flight: a cycle never overlaps another, commands wait for it
//! - Reloads apply between cycles

pub mod command;
pub mod cycle;
mod daemon;

pub use command::SupervisorCommand;
pub use cycle::{CycleReport, Dependencies, ServiceReport, Supervisor};
