//! Discovery configuration.

use std::net::Ipv4Addr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Well-known UDP port games are advertised on.
pub const DEFAULT_DISCOVERY_PORT: u16 = 2023;

/// Ports, addresses and timings for LAN discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// UDP port the server broadcasts to and the client listens on.
    pub port: u16,

    /// Where the server sends its datagrams.
    pub broadcast_addr: Ipv4Addr,

    /// Pause between two broadcasts.
    pub broadcast_interval: Duration,

    /// How long the client blocks on one receive before checking for
    /// cancellation.
    pub receive_timeout: Duration,

    /// How often the menu re-reads the service list (~60 Hz).
    pub menu_poll_interval: Duration,

    /// Give up picking a service after this long. `None` waits forever.
    pub menu_timeout: Option<Duration>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_DISCOVERY_PORT,
            broadcast_addr: Ipv4Addr::BROADCAST,
            broadcast_interval: Duration::from_millis(500),
            receive_timeout: Duration::from_millis(500),
            menu_poll_interval: Duration::from_millis(1000 / 60),
            menu_timeout: None,
        }
    }
}

impl DiscoveryConfig {
    /// Clamps intervals to at least 1 ms. A zero read timeout would make
    /// the socket block forever.
    pub fn validated(mut self) -> Self {
        let min = Duration::from_millis(1);
        for (name, value) in [
            ("broadcast_interval", &mut self.broadcast_interval),
            ("receive_timeout", &mut self.receive_timeout),
            ("menu_poll_interval", &mut self.menu_poll_interval),
        ] {
            if *value < min {
                tracing::warn!(setting = name, "interval below 1 ms, clamping");
                *value = min;
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.port, 2023);
        assert_eq!(config.broadcast_addr, Ipv4Addr::new(255, 255, 255, 255));
        assert_eq!(config.broadcast_interval, Duration::from_millis(500));
        assert_eq!(config.receive_timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_validated_clamps_zero_timeout() {
        let config = DiscoveryConfig {
            receive_timeout: Duration::ZERO,
            ..Default::default()
        }
        .validated();
        assert_eq!(config.receive_timeout, Duration::from_millis(1));
    }

    #[test]
    fn test_partial_json() {
        let config: DiscoveryConfig =
            serde_json::from_str(r#"{ "port": 4000, "broadcast_addr": "192.168.1.255" }"#)
                .unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.broadcast_addr, Ipv4Addr::new(192, 168, 1, 255));
        assert_eq!(config.menu_timeout, None);
    }
}
