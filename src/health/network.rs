//! Aggregate network observation: end-to-end DNS and VIP presence.
//!
//! Deliberately independent of per-container results. A container can be
//! "running" while the resolver path through the VIP is broken.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::config::SupervisorConfig;
use crate::health::dns;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsStatus {
    pub resolver: SocketAddr,
    pub domain: String,
    pub reachable: bool,
    pub detail: String,
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VipStatus {
    pub address: IpAddr,
    pub present: bool,
}

/// One observation. `None` means the check is not configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStatus {
    pub dns: Option<DnsStatus>,
    pub vip: Option<VipStatus>,
}

impl NetworkStatus {
    pub fn dns_reachable(&self) -> Option<bool> {
        self.dns.as_ref().map(|d| d.reachable)
    }

    pub fn vip_present(&self) -> Option<bool> {
        self.vip.as_ref().map(|v| v.present)
    }
}

#[async_trait]
pub trait NetworkProbe: Send + Sync {
    async fn observe(&self) -> NetworkStatus;
}

/// Probes the configured resolver and enumerates local interfaces.
pub struct LocalNetworkProbe {
    dns: Option<(SocketAddr, String)>,
    vip: Option<IpAddr>,
    timeout: Duration,
    retries: u32,
}

impl LocalNetworkProbe {
    pub fn from_config(config: &SupervisorConfig) -> Self {
        Self {
            dns: config
                .dns
                .enabled
                .then(|| (config.dns.resolver, config.dns.test_domain.clone())),
            vip: config.vip.address,
            timeout: config.probe.timeout(),
            retries: config.probe.dns_retries,
        }
    }
}

#[async_trait]
impl NetworkProbe for LocalNetworkProbe {
    async fn observe(&self) -> NetworkStatus {
        let dns = match &self.dns {
            Some((resolver, domain)) => {
                Some(match dns::probe(*resolver, domain, self.timeout, self.retries).await {
                    Ok(answer) => DnsStatus {
                        resolver: *resolver,
                        domain: domain.clone(),
                        reachable: true,
                        detail: format!("{} answer(s)", answer.answers),
                        latency_ms: Some(answer.latency.as_millis() as u64),
                    },
                    Err(e) => DnsStatus {
                        resolver: *resolver,
                        domain: domain.clone(),
                        reachable: false,
                        detail: e.to_string(),
                        latency_ms: None,
                    },
                })
            }
            None => None,
        };

        let vip = self.vip.map(|address| VipStatus {
            address,
            present: vip_present(address),
        });

        NetworkStatus { dns, vip }
    }
}

/// Whether `address` is assigned to a local interface.
pub fn vip_present(address: IpAddr) -> bool {
    match if_addrs::get_if_addrs() {
        Ok(interfaces) => interfaces.iter().any(|iface| iface.ip() == address),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to enumerate interfaces");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::dns::tests::spawn_resolver;
    use hickory_proto::op::ResponseCode;

    #[test]
    fn test_loopback_is_present() {
        assert!(vip_present(IpAddr::from([127, 0, 0, 1])));
        assert!(!vip_present(IpAddr::from([203, 0, 113, 254])));
    }

    #[tokio::test]
    async fn test_observes_resolver_and_vip() {
        let (resolver, _) = spawn_resolver(ResponseCode::NoError, 0).await;
        let mut config = SupervisorConfig::default();
        config.dns.resolver = resolver;
        config.vip.address = Some(IpAddr::from([127, 0, 0, 1]));

        let status = LocalNetworkProbe::from_config(&config).observe().await;
        assert_eq!(status.dns_reachable(), Some(true));
        assert_eq!(status.vip_present(), Some(true));
    }

    #[tokio::test]
    async fn test_disabled_checks_report_none() {
        let mut config = SupervisorConfig::default();
        config.dns.enabled = false;
        let status = LocalNetworkProbe::from_config(&config).observe().await;
        assert_eq!(status, NetworkStatus::default());
    }
}
