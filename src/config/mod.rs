//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (HEALTH_CHECK_INTERVAL, ...)
//!     → validation.rs (semantic checks)
//!     → SupervisorConfig (validated, immutable)
//!
//! On reload (file change or SIGHUP):
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → sent to the supervisor loop over a channel
//!     → applied between cycles, never mid-cycle
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - A config that fails validation on reload is logged and ignored

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::SupervisorConfig;
pub use schema::LoopConfig;
pub use schema::ServiceConfig;
pub use schema::DnsCheckConfig;
pub use schema::NotificationConfig;
pub use schema::ObservabilityConfig;
