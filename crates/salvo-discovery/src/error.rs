use salvo_protocol::ProtocolError;

/// Errors that can occur while advertising or looking for a game.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// The discovery socket couldn't be bound.
    #[error("bind to {addr} failed: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuring the socket failed.
    #[error("socket setup failed: {0}")]
    Socket(#[source] std::io::Error),

    /// The service record couldn't be encoded.
    #[error("failed to encode service info: {0}")]
    Encode(#[from] ProtocolError),

    /// The background thread couldn't be started.
    #[error("failed to spawn discovery thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// No service was picked before the menu timed out.
    #[error("no service selected in time")]
    Timeout,

    /// The search was cancelled before a service was picked.
    #[error("discovery cancelled")]
    Cancelled,
}
