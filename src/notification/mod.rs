//! Alert delivery.
//!
//! Breaker transitions become alerts; the dispatcher POSTs them to webhooks
//! and an optional messaging relay. Delivery is outside the correctness
//! contract of the breaker: failures are logged and counted, nothing more.

pub mod dispatcher;
pub mod payload;

pub use dispatcher::{NotificationDispatcher, Notifier};
pub use payload::{Notification, Severity};
