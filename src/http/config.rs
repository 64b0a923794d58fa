use std::time::Duration;

use super::remap::HostMap;

/// Where outbound proxies come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyMode {
    /// `HTTP_PROXY`, `HTTPS_PROXY`, `ALL_PROXY` and `NO_PROXY`.
    FromEnv,
    Disabled,
}

/// Transport settings, fixed for the lifetime of the client.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub hosts: HostMap,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// TCP keep-alive interval.
    pub keep_alive: Duration,
    /// Deadline for the whole exchange, body read included.
    pub request_timeout: Duration,
    /// Extra time allowed on top of `connect_timeout` for the TLS handshake.
    pub tls_handshake_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: Duration,
    pub proxy: ProxyMode,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            hosts: HostMap::default(),
            connect_timeout: Duration::from_secs(10),
            keep_alive: Duration::from_secs(20),
            request_timeout: Duration::from_secs(20),
            tls_handshake_timeout: Duration::from_secs(10),
            pool_max_idle_per_host: 10,
            pool_idle_timeout: Duration::from_secs(20),
            proxy: ProxyMode::FromEnv,
        }
    }
}
