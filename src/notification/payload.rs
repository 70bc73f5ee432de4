//! Alert payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Alert severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Recovery,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Recovery => "recovery",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }

    /// Relay priority (ntfy/gotify scale, 1..=5).
    pub fn priority(&self) -> u8 {
        match self {
            Severity::Info => 2,
            Severity::Recovery => 3,
            Severity::Warning => 4,
            Severity::Critical => 5,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Webhook body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub event_id: Uuid,
    pub severity: Severity,
    pub message: String,
    pub hostname: String,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(severity: Severity, message: impl Into<String>, hostname: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            severity,
            message: message.into(),
            hostname: hostname.to_string(),
            timestamp,
        }
    }

    /// Body for messaging relays, which only render text.
    pub fn relay_body(&self) -> RelayMessage {
        RelayMessage {
            title: format!("[{}] dns-ha-supervisor on {}", self.severity.as_str().to_uppercase(), self.hostname),
            text: format!("{} ({})", self.message, self.timestamp.to_rfc3339()),
            priority: self.severity.priority(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayMessage {
    pub title: String,
    pub text: String,
    pub priority: u8,
}
