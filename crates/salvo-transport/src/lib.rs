//! Transport abstraction layer for Salvo.
//!
//! Provides the [`Transport`] trait: a single byte-stream connection
//! between the two peers, polled once per frame without blocking.
//! [`TcpServerTransport`] and [`TcpClientTransport`] implement it over TCP;
//! [`memory::pair`] gives an in-process pair for tests.

mod config;
mod error;
pub mod memory;
mod tcp;

pub use config::TransportConfig;
pub use error::TransportError;
pub use tcp::{TcpClientTransport, TcpServerTransport};

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

/// Which side of the session a transport is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Listens and accepts exactly one client.
    Server,
    /// Connects outward to a known host.
    Client,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server => write!(f, "server"),
            Self::Client => write!(f, "client"),
        }
    }
}

/// A single connection that can send and receive bytes.
///
/// There is no multi-client fan-out: a transport talks to exactly one
/// remote peer for its whole life.
pub trait Transport: Send + 'static {
    /// Blocks until the connection is established.
    ///
    /// The only blocking call in the stack. Implementations must bound it
    /// with a timeout so a missing peer can't hang the process.
    fn wait_until_ready(&mut self) -> Result<(), TransportError>;

    /// Like [`wait_until_ready`](Self::wait_until_ready), but gives up after
    /// `limit` if that is sooner than the transport's own timeout.
    ///
    /// The default ignores `limit`, which suits transports that never block.
    fn wait_until_ready_within(&mut self, limit: Duration) -> Result<(), TransportError> {
        let _ = limit;
        self.wait_until_ready()
    }

    /// Writes all of `bytes` to the stream.
    fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Reads whatever is queued into `buf` and returns the count.
    ///
    /// Never blocks: returns `Ok(0)` immediately when nothing is queued.
    fn receive_bytes(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Shuts the connection down. Further sends fail with
    /// [`TransportError::Closed`].
    fn close(&mut self) -> Result<(), TransportError>;

    /// Which side of the session this is.
    fn role(&self) -> Role;

    /// Returns `true` once `wait_until_ready` has succeeded and until `close`.
    fn is_connected(&self) -> bool;

    /// Address of the remote peer, when connected.
    fn peer_addr(&self) -> Option<SocketAddr>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn wait_until_ready(&mut self) -> Result<(), TransportError> {
        (**self).wait_until_ready()
    }

    fn wait_until_ready_within(&mut self, limit: Duration) -> Result<(), TransportError> {
        (**self).wait_until_ready_within(limit)
    }

    fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).send_bytes(bytes)
    }

    fn receive_bytes(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        (**self).receive_bytes(buf)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        (**self).close()
    }

    fn role(&self) -> Role {
        (**self).role()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        (**self).peer_addr()
    }
}
