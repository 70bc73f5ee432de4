//! Operator commands delivered to the running loop.

/// Applied between cycles, never concurrently with one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorCommand {
    /// Close the breaker of one service, or of all services when `None`.
    ResetBreaker { service: Option<String> },
}
