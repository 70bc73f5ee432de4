//! Configuration loading from disk and environment.

use std::path::Path;
use std::fs;
use crate::config::schema::{ServiceConfig, SupervisorConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env { key: String, value: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { key, value } => {
                write!(f, "Invalid value '{}' for environment variable {}", value, key)
            }
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration from an optional TOML file, apply process environment
/// overrides, then validate.
pub fn load_config(path: Option<&Path>) -> Result<SupervisorConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_file(path)?,
        None => SupervisorConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn parse_file(path: &Path) -> Result<SupervisorConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map_err(ConfigError::Parse)
}

/// Apply the deployment's key/value settings on top of the file.
///
/// Recognised keys: `HEALTH_CHECK_INTERVAL`, `MAX_RESTART_ATTEMPTS`,
/// `RESTART_COOLDOWN`, `CIRCUIT_BREAKER_TIMEOUT`, `MONITORED_SERVICES`
/// (comma separated ids, replaces the service list), `NOTIFY_WEBHOOK_URLS`
/// (comma separated) and `NOTIFY_RELAY_URL`.
pub fn apply_env_overrides<F>(config: &mut SupervisorConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("HEALTH_CHECK_INTERVAL") {
        config.supervisor.interval_secs = parse_env("HEALTH_CHECK_INTERVAL", &v)?;
    }
    if let Some(v) = lookup("MAX_RESTART_ATTEMPTS") {
        config.supervisor.max_restart_attempts = parse_env("MAX_RESTART_ATTEMPTS", &v)?;
    }
    if let Some(v) = lookup("RESTART_COOLDOWN") {
        config.supervisor.restart_cooldown_secs = parse_env("RESTART_COOLDOWN", &v)?;
    }
    if let Some(v) = lookup("CIRCUIT_BREAKER_TIMEOUT") {
        config.supervisor.circuit_breaker_timeout_secs = parse_env("CIRCUIT_BREAKER_TIMEOUT", &v)?;
    }
    if let Some(v) = lookup("MONITORED_SERVICES") {
        // Keep per-service settings from the file for ids that survive.
        let previous = std::mem::take(&mut config.services);
        config.services = split_list(&v)
            .map(|id| {
                previous
                    .iter()
                    .find(|s| s.id == id)
                    .cloned()
                    .unwrap_or_else(|| ServiceConfig::new(id))
            })
            .collect();
    }
    if let Some(v) = lookup("NOTIFY_WEBHOOK_URLS") {
        config.notifications.webhook_urls = split_list(&v).map(str::to_string).collect();
    }
    if let Some(v) = lookup("NOTIFY_RELAY_URL") {
        let v = v.trim();
        config.notifications.relay_url = (!v.is_empty()).then(|| v.to_string());
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const SAMPLE: &str = r#"
[supervisor]
interval_secs = 30
max_restart_attempts = 5

[dns]
resolver = "192.168.8.255:53"
test_domain = "example.com"

[[services]]
id = "pihole-primary"
container = "pihole"
dns_check = { address = "172.20.0.2:53" }
depends_on = ["unbound"]

[[services]]
id = "unbound"

[notifications]
webhook_urls = ["http://hooks.local/alert"]
"#;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parses_file_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = parse_file(file.path()).unwrap();
        assert_eq!(config.supervisor.interval_secs, 30);
        assert_eq!(config.supervisor.max_restart_attempts, 5);
        assert_eq!(config.supervisor.restart_cooldown_secs, 300);
        assert_eq!(config.services.len(), 2);
        assert_eq!(config.services[0].container_name(), "pihole");
        assert_eq!(config.services[1].container_name(), "unbound");
        assert!(config.services[0].dns_check.is_some());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_env_overrides_win() {
        let mut config: SupervisorConfig = toml::from_str(SAMPLE).unwrap();
        apply_env_overrides(
            &mut config,
            env(&[
                ("HEALTH_CHECK_INTERVAL", "15"),
                ("RESTART_COOLDOWN", "120"),
                ("CIRCUIT_BREAKER_TIMEOUT", "600"),
                ("MONITORED_SERVICES", "unbound, keepalived"),
                ("NOTIFY_RELAY_URL", "https://ntfy.sh/dns"),
            ]),
        )
        .unwrap();

        assert_eq!(config.supervisor.interval_secs, 15);
        assert_eq!(config.supervisor.restart_cooldown_secs, 120);
        assert_eq!(config.supervisor.circuit_breaker_timeout_secs, 600);
        let ids: Vec<_> = config.services.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["unbound", "keepalived"]);
        assert_eq!(config.notifications.relay_url.as_deref(), Some("https://ntfy.sh/dns"));
        assert_eq!(config.notifications.webhook_urls.len(), 1);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = SupervisorConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("MAX_RESTART_ATTEMPTS", "three")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { ref key, .. } if key == "MAX_RESTART_ATTEMPTS"));
    }
}
