//! Unified error type for Salvo.

use salvo_discovery::DiscoveryError;
use salvo_peer::PeerError;
use salvo_protocol::ProtocolError;
use salvo_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` on each variant lets `?` convert sub-crate errors
/// automatically.
#[derive(Debug, thiserror::Error)]
pub enum SalvoError {
    /// Connecting, sending or receiving failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Bytes on the wire or the registry were wrong.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A peer operation failed.
    #[error(transparent)]
    Peer(#[from] PeerError),

    /// Advertising or finding a game failed.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// Launch options or a config file were invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}
