//! Server configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Standard DNS port.
pub const DNS_PORT: u16 = 53;

/// Configuration for the DNS server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Local address to bind (e.g., 0.0.0.0:53)
    pub bind_addr: SocketAddr,
    /// How often the record source is re-run.
    pub refresh_interval: Duration,
    /// Pause before rebinding after a bind failure or a fatal read error.
    pub rebind_backoff: Duration,
    /// Socket read deadline; bounds how long shutdown can go unnoticed.
    pub read_timeout: Duration,
    /// How often request statistics are logged.
    pub stats_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DNS_PORT)),
            refresh_interval: Duration::from_secs(120),
            rebind_backoff: Duration::from_secs(5),
            read_timeout: Duration::from_secs(1),
            stats_interval: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_listen_on_all_interfaces() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:53");
        assert_eq!(config.refresh_interval, Duration::from_secs(120));
        assert_eq!(config.rebind_backoff, Duration::from_secs(5));
        assert_eq!(config.read_timeout, Duration::from_secs(1));
    }
}
