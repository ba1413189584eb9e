//! Error types for the peer layer.

use salvo_protocol::ProtocolError;
use salvo_transport::TransportError;

/// Errors returned by [`NetworkPeer`](crate::NetworkPeer) operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Encoding, framing or registration failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The underlying connection failed. The peer is no longer ready.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The peer hasn't completed `wait_until_ready`, or has disconnected.
    #[error("peer is not ready")]
    NotReady,
}
