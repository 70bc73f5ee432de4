//! Per-service health probing.
//!
//! # Responsibilities
//! - Liveness: container present and running
//! - Declared health: the container's own healthcheck verdict
//! - Functional: optional DNS resolution through the service
//!
//! A probe never fails: timeouts and runtime errors become `Unhealthy`.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::clock::Clock;
use crate::config::ServiceConfig;
use crate::error::SupervisorError;
use crate::health::dns;
use crate::health::result::HealthCheckResult;
use crate::runtime::{ContainerRuntime, ContainerState, DeclaredHealth};

/// Anything that can produce a verdict for a service.
#[async_trait]
pub trait ServiceProbe: Send + Sync {
    async fn check(&self, service: &ServiceConfig) -> HealthCheckResult;
}

pub struct HealthProbe {
    runtime: Arc<dyn ContainerRuntime>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    dns_retries: u32,
    default_domain: String,
}

impl HealthProbe {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
        dns_retries: u32,
        default_domain: impl Into<String>,
    ) -> Self {
        Self {
            runtime,
            clock,
            timeout,
            dns_retries,
            default_domain: default_domain.into(),
        }
    }
}

#[async_trait]
impl ServiceProbe for HealthProbe {
    async fn check(&self, service: &ServiceConfig) -> HealthCheckResult {
        let id = service.id.as_str();
        let name = service.container_name();

        let state = match timeout(self.timeout, self.runtime.inspect(name)).await {
            Ok(Ok(state)) => state,
            Ok(Err(e)) => {
                return HealthCheckResult::unhealthy(id, self.clock.now(), format!("runtime query failed: {}", e));
            }
            Err(_) => {
                let err = SupervisorError::ProbeTimeout(self.timeout);
                return HealthCheckResult::unhealthy(id, self.clock.now(), err.to_string());
            }
        };

        let declared = match state {
            ContainerState::Missing => {
                return HealthCheckResult::unhealthy(id, self.clock.now(), format!("container '{}' not found", name));
            }
            ContainerState::Stopped { status } => {
                return HealthCheckResult::unhealthy(id, self.clock.now(), format!("container is {}", status));
            }
            ContainerState::Running { health } => health,
        };

        match declared {
            Some(DeclaredHealth::Unhealthy) => {
                return HealthCheckResult::unhealthy(id, self.clock.now(), "container healthcheck reports unhealthy");
            }
            Some(DeclaredHealth::Starting) => {
                return HealthCheckResult::starting(id, self.clock.now(), "container healthcheck is starting");
            }
            Some(DeclaredHealth::Healthy) | None => {}
        }

        let Some(check) = &service.dns_check else {
            let detail = if declared.is_some() { "running, healthcheck passing" } else { "running" };
            return HealthCheckResult::healthy(id, self.clock.now(), detail);
        };

        let domain = check.domain.as_deref().unwrap_or(&self.default_domain);
        match dns::probe(check.address, domain, self.timeout, self.dns_retries).await {
            Ok(answer) => HealthCheckResult::healthy(
                id,
                self.clock.now(),
                format!(
                    "resolved {} via {} in {}ms",
                    domain,
                    check.address,
                    answer.latency.as_millis()
                ),
            ),
            Err(e) => HealthCheckResult::unhealthy(
                id,
                self.clock.now(),
                format!("DNS check against {} failed: {}", check.address, e),
            ),
        }
    }
}
