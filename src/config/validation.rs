//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges, service id
//! uniqueness, dependency references and sink URLs. All errors are collected
//! so an operator sees every problem in one pass.

use std::collections::HashSet;
use std::fmt;

use crate::config::schema::SupervisorConfig;
use crate::health::dns::MAX_DNS_RETRIES;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &SupervisorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let lp = &config.supervisor;

    if lp.interval_secs == 0 {
        errors.push(ValidationError::new("supervisor.interval_secs", "must be greater than 0"));
    }
    if lp.max_restart_attempts == 0 {
        errors.push(ValidationError::new(
            "supervisor.max_restart_attempts",
            "must be at least 1",
        ));
    }
    if lp.recovery_confirmations == 0 {
        errors.push(ValidationError::new(
            "supervisor.recovery_confirmations",
            "must be at least 1",
        ));
    }
    if config.probe.timeout_ms == 0 {
        errors.push(ValidationError::new("probe.timeout_ms", "must be greater than 0"));
    }
    if config.probe.dns_retries > MAX_DNS_RETRIES {
        errors.push(ValidationError::new(
            "probe.dns_retries",
            format!("must be at most {}", MAX_DNS_RETRIES),
        ));
    }
    if config.runtime.restart_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "runtime.restart_timeout_secs",
            "must be greater than 0",
        ));
    }
    if config.dns.enabled && config.dns.test_domain.trim().is_empty() {
        errors.push(ValidationError::new("dns.test_domain", "must not be empty"));
    }

    let mut seen = HashSet::new();
    for (i, service) in config.services.iter().enumerate() {
        let field = format!("services[{}]", i);
        if service.id.trim().is_empty() {
            errors.push(ValidationError::new(format!("{}.id", field), "must not be empty"));
            continue;
        }
        if !seen.insert(service.id.as_str()) {
            errors.push(ValidationError::new(
                format!("{}.id", field),
                format!("duplicate service id '{}'", service.id),
            ));
        }
    }
    for (i, service) in config.services.iter().enumerate() {
        for dep in &service.depends_on {
            if dep == &service.id {
                errors.push(ValidationError::new(
                    format!("services[{}].depends_on", i),
                    "a service cannot depend on itself",
                ));
            } else if !seen.contains(dep.as_str()) {
                errors.push(ValidationError::new(
                    format!("services[{}].depends_on", i),
                    format!("unknown service '{}'", dep),
                ));
            }
        }
    }

    let notif = &config.notifications;
    for (i, raw) in notif.webhook_urls.iter().enumerate() {
        check_url(&mut errors, &format!("notifications.webhook_urls[{}]", i), raw);
    }
    if let Some(raw) = &notif.relay_url {
        check_url(&mut errors, "notifications.relay_url", raw);
    }
    if notif.timeout_secs == 0 {
        errors.push(ValidationError::new(
            "notifications.timeout_secs",
            "must be greater than 0",
        ));
    }

    if config.status.enabled && config.status.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "status.bind_address",
            format!("invalid socket address '{}'", config.status.bind_address),
        ));
    }
    if matches!(&config.status.admin_token, Some(t) if t.trim().is_empty()) {
        errors.push(ValidationError::new("status.admin_token", "must not be empty when set"));
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &str, raw: &str) {
    match url::Url::parse(raw) {
        Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
        Ok(u) => errors.push(ValidationError::new(
            field,
            format!("unsupported scheme '{}'", u.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("invalid URL: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ServiceConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&SupervisorConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = SupervisorConfig::default();
        config.supervisor.interval_secs = 0;
        config.supervisor.max_restart_attempts = 0;
        config.notifications.webhook_urls.push("ftp://example.com/hook".into());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.field == "notifications.webhook_urls[0]"));
    }

    #[test]
    fn test_rejects_duplicate_and_dangling_services() {
        let mut config = SupervisorConfig::default();
        config.services.push(ServiceConfig::new("pihole"));
        config.services.push(ServiceConfig::new("pihole"));
        let mut dependent = ServiceConfig::new("exporter");
        dependent.depends_on.push("unbound".into());
        config.services.push(dependent);

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("duplicate service id")));
        assert!(errors.iter().any(|e| e.message.contains("unknown service 'unbound'")));
    }

    #[test]
    fn test_rejects_more_than_one_dns_retry() {
        let mut config = SupervisorConfig::default();
        config.probe.dns_retries = 1;
        assert!(validate_config(&config).is_ok());

        config.probe.dns_retries = 5;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "probe.dns_retries");
    }
}
