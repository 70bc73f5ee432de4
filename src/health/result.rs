//! Probe outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tri-state probe verdict.
///
/// `Starting` is a grace state: it neither counts as a failure nor as a success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Healthy,
    Unhealthy,
    Starting,
}

impl ProbeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Healthy => "healthy",
            ProbeStatus::Unhealthy => "unhealthy",
            ProbeStatus::Starting => "starting",
        }
    }
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of probing one service once. Never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub service_id: String,
    pub status: ProbeStatus,
    pub healthy: bool,
    pub timestamp: DateTime<Utc>,
    pub detail: String,
}

impl HealthCheckResult {
    pub fn new(
        service_id: &str,
        status: ProbeStatus,
        timestamp: DateTime<Utc>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            service_id: service_id.to_string(),
            healthy: status == ProbeStatus::Healthy,
            status,
            timestamp,
            detail: detail.into(),
        }
    }

    pub fn healthy(service_id: &str, timestamp: DateTime<Utc>, detail: impl Into<String>) -> Self {
        Self::new(service_id, ProbeStatus::Healthy, timestamp, detail)
    }

    pub fn unhealthy(service_id: &str, timestamp: DateTime<Utc>, detail: impl Into<String>) -> Self {
        Self::new(service_id, ProbeStatus::Unhealthy, timestamp, detail)
    }

    pub fn starting(service_id: &str, timestamp: DateTime<Utc>, detail: impl Into<String>) -> Self {
        Self::new(service_id, ProbeStatus::Starting, timestamp, detail)
    }
}
