//! Best-effort fan-out to configured sinks.

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;

use crate::config::NotificationConfig;
use crate::error::SupervisorError;
use crate::notification::payload::{Notification, Severity};
use crate::observability::metrics;

/// Receives alerts. Implementations must never fail the caller.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, severity: Severity, message: &str);
}

#[derive(Debug, Clone)]
enum Sink {
    Webhook { url: String },
    Relay { url: String, token: Option<String> },
}

impl Sink {
    fn url(&self) -> &str {
        match self {
            Sink::Webhook { url } | Sink::Relay { url, .. } => url,
        }
    }
}

pub struct NotificationDispatcher {
    client: reqwest::Client,
    sinks: Vec<Sink>,
    hostname: String,
}

impl NotificationDispatcher {
    pub fn new(config: &NotificationConfig, hostname: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client for notifications");
                reqwest::Client::new()
            });

        let mut sinks: Vec<Sink> = config
            .webhook_urls
            .iter()
            .map(|url| Sink::Webhook { url: url.clone() })
            .collect();
        if let Some(url) = &config.relay_url {
            sinks.push(Sink::Relay {
                url: url.clone(),
                token: config.relay_token.clone(),
            });
        }

        Self {
            client,
            sinks,
            hostname: hostname.into(),
        }
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    async fn deliver(&self, sink: &Sink, notification: &Notification) -> Result<(), SupervisorError> {
        let request = match sink {
            Sink::Webhook { url } => self
                .client
                .post(url)
                .header("x-event-id", notification.event_id.to_string())
                .json(notification),
            Sink::Relay { url, token } => {
                let req = self.client.post(url).json(&notification.relay_body());
                match token {
                    Some(token) => req.bearer_auth(token),
                    None => req,
                }
            }
        };

        let failed = |reason: String| SupervisorError::NotificationDeliveryFailed {
            sink: sink.url().to_string(),
            reason,
        };

        let response = request.send().await.map_err(|e| failed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(failed(format!("HTTP {}", response.status())));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for NotificationDispatcher {
    async fn notify(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Critical => tracing::error!(%severity, message, "Alert"),
            Severity::Warning => tracing::warn!(%severity, message, "Alert"),
            _ => tracing::info!(%severity, message, "Alert"),
        }

        let notification = Notification::new(severity, message, &self.hostname, Utc::now());
        for sink in &self.sinks {
            if let Err(e) = self.deliver(sink, &notification).await {
                tracing::warn!(error = %e, "Notification delivery failed");
                metrics::record_notification_failure(sink.url());
            }
        }
    }
}
