//! Transport configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timeouts and socket options for the TCP transports.
///
/// Both timeouts bound [`Transport::wait_until_ready`](crate::Transport::wait_until_ready),
/// the one blocking call in the whole stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// How long the server waits for its single client.
    pub accept_timeout: Duration,

    /// How long the client keeps trying to reach the server.
    pub connect_timeout: Duration,

    /// Pause between connection attempts while the server isn't up yet.
    pub connect_retry_interval: Duration,

    /// How often the server checks the non-blocking listener.
    pub accept_poll_interval: Duration,

    /// Disable Nagle's algorithm. Packets here are small and latency-bound.
    pub nodelay: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            accept_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(30),
            connect_retry_interval: Duration::from_millis(250),
            accept_poll_interval: Duration::from_millis(10),
            nodelay: true,
        }
    }
}

impl TransportConfig {
    /// Sets both handshake timeouts to `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            accept_timeout: timeout,
            connect_timeout: timeout,
            ..Default::default()
        }
    }

    /// Fixes values that would make the handshake loops spin or never end.
    ///
    /// - Poll and retry intervals are at least 1 ms.
    /// - The retry interval never exceeds the connect timeout.
    pub fn validated(mut self) -> Self {
        let min = Duration::from_millis(1);
        if self.accept_poll_interval < min {
            tracing::warn!("accept_poll_interval below 1 ms, clamping");
            self.accept_poll_interval = min;
        }
        if self.connect_retry_interval < min {
            tracing::warn!("connect_retry_interval below 1 ms, clamping");
            self.connect_retry_interval = min;
        }
        if self.connect_retry_interval > self.connect_timeout {
            self.connect_retry_interval = self.connect_timeout.max(min);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts() {
        let config = TransportConfig::default();
        assert_eq!(config.accept_timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert!(config.nodelay);
    }

    #[test]
    fn test_validated_clamps_zero_intervals() {
        let config = TransportConfig {
            accept_poll_interval: Duration::ZERO,
            connect_retry_interval: Duration::ZERO,
            ..Default::default()
        }
        .validated();
        assert_eq!(config.accept_poll_interval, Duration::from_millis(1));
        assert_eq!(config.connect_retry_interval, Duration::from_millis(1));
    }

    #[test]
    fn test_validated_caps_retry_at_timeout() {
        let config = TransportConfig {
            connect_timeout: Duration::from_millis(100),
            connect_retry_interval: Duration::from_secs(5),
            ..Default::default()
        }
        .validated();
        assert_eq!(config.connect_retry_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let config: TransportConfig =
            serde_json::from_str(r#"{ "nodelay": false }"#).unwrap();
        assert!(!config.nodelay);
        assert_eq!(config.accept_timeout, Duration::from_secs(30));
    }
}
