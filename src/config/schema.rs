//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from the TOML config
//! file. The CLI fills the same structure.

use serde::{Deserialize, Serialize};

use crate::routing::HostMatching;

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listen host and port.
    pub listener: ListenerConfig,

    /// Host matching behaviour.
    pub routing: RoutingConfig,

    /// Hostname → target pairs, in order. Later duplicates win.
    pub routes: Vec<RouteConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Host or address to bind.
    pub host: String,

    /// TCP port to bind.
    pub port: u16,
}

impl ListenerConfig {
    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 80,
        }
    }
}

/// Routing behaviour.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Compare hostnames after ASCII lowercasing.
    pub case_insensitive_hosts: bool,
}

impl RoutingConfig {
    pub fn host_matching(&self) -> HostMatching {
        if self.case_insensitive_hosts {
            HostMatching::CaseInsensitive
        } else {
            HostMatching::Exact
        }
    }
}

/// One hostname and the backend URL it forwards to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Host header value to match.
    pub host: String,

    /// Absolute backend URL (`http`, `https`, `ws` or `wss`).
    pub target: String,
}

impl RouteConfig {
    pub fn new(host: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            target: target.into(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) when `RUST_LOG` is unset.
    pub log_level: String,

    /// Prometheus scrape endpoint; disabled when absent.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_address: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_listen_on_port_80() {
        let config = ProxyConfig::default();
        assert_eq!(config.listener.bind_address(), "0.0.0.0:80");
        assert!(config.routes.is_empty());
        assert_eq!(config.routing.host_matching(), HostMatching::Exact);
    }

    #[test]
    fn ipv6_hosts_are_bracketed() {
        let listener = ListenerConfig {
            host: "::1".to_string(),
            port: 8080,
        };
        assert_eq!(listener.bind_address(), "[::1]:8080");
    }
}
