/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An operation needed a connection that doesn't exist yet.
    #[error("not connected")]
    NotConnected,

    /// `wait_until_ready` was called on an already connected transport.
    #[error("already connected")]
    AlreadyConnected,

    /// Binding the listening socket failed.
    #[error("bind to {addr} failed: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Accepting the client connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Connecting to the server failed.
    #[error("connect to {addr} failed: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The handshake did not complete in time.
    #[error("{0} timed out")]
    Timeout(&'static str),

    /// The transport was closed locally.
    #[error("transport closed")]
    Closed,
}
