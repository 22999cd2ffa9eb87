//! Zero-configuration discovery contract
//!
//! Producers advertise their listening port under a fixed DNS-SD service
//! type; consumers browse and resolve to host+port, or bypass discovery
//! entirely with a user-supplied `host:port` override. The mDNS backends
//! themselves live outside the crate, behind [`ServiceAdvertiser`] and
//! [`ServiceBrowser`]; discovery only supplies endpoints and is never in
//! the data path.

use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use crate::error::{DiscoveryError, Error};

/// DNS-SD service type for mirror producers
pub const SERVICE_TYPE: &str = "_screenreflect._tcp.";

/// What a producer publishes: an instance name and its accepted port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAnnouncement {
    pub instance: String,
    pub port: u16,
}

impl ServiceAnnouncement {
    pub fn new(instance: impl Into<String>, port: u16) -> Self {
        Self {
            instance: instance.into(),
            port,
        }
    }
}

/// A browsed service resolved to a connectable endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedService {
    pub instance: String,
    pub endpoint: Endpoint,
}

/// Producer-side discovery façade
pub trait ServiceAdvertiser: Send {
    fn advertise(&mut self, announcement: &ServiceAnnouncement) -> Result<(), DiscoveryError>;
    fn withdraw(&mut self) -> Result<(), DiscoveryError>;
}

/// Consumer-side discovery façade
pub trait ServiceBrowser: Send {
    /// Currently visible producers, resolved to endpoints
    fn browse(&mut self) -> Result<Vec<ResolvedService>, DiscoveryError>;
}

/// Advertiser that only logs; used when no mDNS backend is wired in
#[derive(Debug, Default)]
pub struct LogOnlyAdvertiser {
    active: Option<ServiceAnnouncement>,
}

impl ServiceAdvertiser for LogOnlyAdvertiser {
    fn advertise(&mut self, announcement: &ServiceAnnouncement) -> Result<(), DiscoveryError> {
        tracing::info!(
            service_type = SERVICE_TYPE,
            instance = %announcement.instance,
            port = announcement.port,
            "advertising (log-only backend)"
        );
        self.active = Some(announcement.clone());
        Ok(())
    }

    fn withdraw(&mut self) -> Result<(), DiscoveryError> {
        if let Some(announcement) = self.active.take() {
            tracing::info!(instance = %announcement.instance, "withdrawing advertisement");
        }
        Ok(())
    }
}

/// A connectable `host:port`, from discovery or a user override
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Resolve to one socket address, preferring IPv4 on dual-stack hosts
    pub fn resolve(&self) -> Result<SocketAddr, Error> {
        let mut addrs: Vec<SocketAddr> = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| DiscoveryError::InvalidEndpoint(format!("{self}: {e}")))?
            .collect();
        addrs.sort_by_key(|a| !a.is_ipv4());
        addrs
            .into_iter()
            .next()
            .ok_or_else(|| DiscoveryError::InvalidEndpoint(self.to_string()).into())
    }
}

impl FromStr for Endpoint {
    type Err = DiscoveryError;

    /// Parse a user-supplied `host:port` override. IPv6 literals use the
    /// usual bracket form, `[::1]:7432`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| DiscoveryError::InvalidEndpoint(s.to_string()))?;
        let port: u16 = port
            .parse()
            .map_err(|_| DiscoveryError::InvalidEndpoint(s.to_string()))?;

        let host = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')).unwrap_or(host);
        if host.is_empty() {
            return Err(DiscoveryError::InvalidEndpoint(s.to_string()));
        }
        Ok(Self::new(host, port))
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// In-memory browser backend for tests
    struct FixedBrowser {
        services: Vec<ResolvedService>,
    }

    impl ServiceBrowser for FixedBrowser {
        fn browse(&mut self) -> Result<Vec<ResolvedService>, DiscoveryError> {
            Ok(self.services.clone())
        }
    }

    #[test]
    fn test_service_type_string() {
        assert_eq!(SERVICE_TYPE, "_screenreflect._tcp.");
    }

    #[test]
    fn test_browser_supplies_endpoints() {
        let mut browser = FixedBrowser {
            services: vec![ResolvedService {
                instance: "Office Mac".into(),
                endpoint: Endpoint::new("192.168.1.20", 7432),
            }],
        };
        let services = browser.browse().unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].endpoint.to_string(), "192.168.1.20:7432");
    }

    #[test]
    fn test_log_only_advertiser_lifecycle() {
        let mut advertiser = LogOnlyAdvertiser::default();
        advertiser
            .advertise(&ServiceAnnouncement::new("Office Mac", 7432))
            .unwrap();
        advertiser.withdraw().unwrap();
        advertiser.withdraw().unwrap();
    }

    #[test]
    fn test_endpoint_parse_host_port() {
        let ep: Endpoint = "den-mac.local:7432".parse().unwrap();
        assert_eq!(ep.host, "den-mac.local");
        assert_eq!(ep.port, 7432);
    }

    #[test]
    fn test_endpoint_parse_ipv4() {
        let ep: Endpoint = "192.168.1.20:9000".parse().unwrap();
        assert_eq!(ep, Endpoint::new("192.168.1.20", 9000));
    }

    #[test]
    fn test_endpoint_parse_ipv6_brackets() {
        let ep: Endpoint = "[fe80::1]:7432".parse().unwrap();
        assert_eq!(ep.host, "fe80::1");
        assert_eq!(ep.to_string(), "[fe80::1]:7432");
    }

    #[test]
    fn test_endpoint_parse_rejects_garbage() {
        assert!("no-port".parse::<Endpoint>().is_err());
        assert!(":7432".parse::<Endpoint>().is_err());
        assert!("host:notaport".parse::<Endpoint>().is_err());
        assert!("host:99999".parse::<Endpoint>().is_err());
    }

    #[test]
    fn test_endpoint_resolves_loopback() {
        let addr = Endpoint::new("127.0.0.1", 7432).resolve().unwrap();
        assert_eq!(addr.port(), 7432);
        assert!(addr.is_ipv4());
    }
}
