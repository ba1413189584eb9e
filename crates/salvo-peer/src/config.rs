//! Peer configuration.

use std::time::Duration;

use salvo_protocol::HEADER_LEN;
use salvo_transport::TransportConfig;
use serde::{Deserialize, Serialize};

/// Smallest buffer that still leaves room for a useful payload.
const MIN_BUFFER_CAPACITY: usize = 1024;

/// Buffer sizes and handshake timeout for a [`NetworkPeer`](crate::NetworkPeer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    /// Size of the transmit and receive buffers, in bytes. Each is allocated
    /// once and reused. A single frame can never be larger than this.
    pub buffer_capacity: usize,

    /// Upper bound on `wait_until_ready`.
    pub handshake_timeout: Duration,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 1024 * 1024,
            handshake_timeout: Duration::from_secs(30),
        }
    }
}

impl PeerConfig {
    /// Clamps the buffer capacity to a usable minimum.
    pub fn validated(mut self) -> Self {
        if self.buffer_capacity < MIN_BUFFER_CAPACITY {
            tracing::warn!(
                requested = self.buffer_capacity,
                min = MIN_BUFFER_CAPACITY,
                "buffer_capacity too small, clamping"
            );
            self.buffer_capacity = MIN_BUFFER_CAPACITY;
        }
        self
    }

    /// Largest payload a received frame may announce.
    pub fn max_payload(&self) -> usize {
        self.buffer_capacity.saturating_sub(HEADER_LEN)
    }

    /// Transport settings that enforce [`handshake_timeout`](Self::handshake_timeout).
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig::with_timeout(self.handshake_timeout)
    }
}
