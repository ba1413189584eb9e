//! TCP transport implementation over `std::net`.
//!
//! The stream stays in blocking mode for writes and is flipped to
//! non-blocking for the duration of each read, so `receive_bytes` returns
//! immediately when nothing is queued while `send_bytes` always writes the
//! whole frame.

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use crate::{Role, Transport, TransportConfig, TransportError};

// ---------------------------------------------------------------------------
// Link: the established stream, shared by both sides
// ---------------------------------------------------------------------------

struct Link {
    stream: TcpStream,
    peer: SocketAddr,
    eof_reported: bool,
}

impl Link {
    fn new(stream: TcpStream, peer: SocketAddr, config: &TransportConfig) -> std::io::Result<Self> {
        // Accepted sockets may inherit the listener's non-blocking flag.
        stream.set_nonblocking(false)?;
        stream.set_nodelay(config.nodelay)?;
        Ok(Self {
            stream,
            peer,
            eof_reported: false,
        })
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.stream
            .write_all(bytes)
            .map_err(TransportError::SendFailed)?;
        tracing::trace!(peer = %self.peer, bytes = bytes.len(), "sent");
        Ok(())
    }

    fn poll(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if buf.is_empty() {
            return Ok(0);
        }

        self.stream
            .set_nonblocking(true)
            .map_err(TransportError::ReceiveFailed)?;
        let result = self.stream.read(buf);
        self.stream
            .set_nonblocking(false)
            .map_err(TransportError::ReceiveFailed)?;

        match result {
            Ok(0) => {
                // Disconnection is signalled by a Disconnect message, not by
                // EOF. Report it once so a crashed peer is at least visible.
                if !self.eof_reported {
                    tracing::warn!(
                        peer = %self.peer,
                        "remote closed the stream without sending Disconnect"
                    );
                    self.eof_reported = true;
                }
                Ok(0)
            }
            Ok(n) => {
                tracing::trace!(peer = %self.peer, bytes = n, "received");
                Ok(n)
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => Ok(0),
            Err(e) => Err(TransportError::ReceiveFailed(e)),
        }
    }

    fn shutdown(self) {
        // The remote may already be gone; there's nothing left to report.
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            tracing::debug!(peer = %self.peer, error = %e, "shutdown after remote close");
        }
    }
}

/// Longest single `connect` attempt when the caller set no deadline.
const MAX_CONNECT_ATTEMPT: Duration = Duration::from_secs(30);

/// `None` when `timeout` is too long to represent, which means no deadline.
fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Listens on a port and accepts exactly one client.
///
/// The socket is bound in [`bind`](Self::bind), so the port is fixed (and
/// can be advertised) before [`wait_until_ready`](Transport::wait_until_ready)
/// starts waiting. The listener is dropped as soon as the client is accepted.
pub struct TcpServerTransport {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    link: Option<Link>,
    config: TransportConfig,
    closed: bool,
}

impl TcpServerTransport {
    /// Binds a listener to the given address, e.g. `"0.0.0.0:666"`.
    pub fn bind(addr: &str, config: TransportConfig) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).map_err(|source| TransportError::BindFailed {
            addr: addr.to_string(),
            source,
        })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| TransportError::BindFailed {
                addr: addr.to_string(),
                source,
            })?;
        tracing::info!(%local_addr, "TCP transport listening");

        Ok(Self {
            listener: Some(listener),
            local_addr,
            link: None,
            config: config.validated(),
            closed: false,
        })
    }

    /// Returns the local address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Transport for TcpServerTransport {
    fn wait_until_ready(&mut self) -> Result<(), TransportError> {
        self.wait_until_ready_within(self.config.accept_timeout)
    }

    fn wait_until_ready_within(&mut self, limit: Duration) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if self.link.is_some() {
            return Err(TransportError::AlreadyConnected);
        }
        let listener = self.listener.as_ref().ok_or(TransportError::Closed)?;
        listener
            .set_nonblocking(true)
            .map_err(TransportError::AcceptFailed)?;

        tracing::info!(addr = %self.local_addr, "waiting for a client");
        let deadline = deadline_after(self.config.accept_timeout.min(limit));

        loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    let link =
                        Link::new(stream, peer, &self.config).map_err(TransportError::AcceptFailed)?;
                    tracing::info!(%peer, "client connected");
                    self.link = Some(link);
                    self.listener = None;
                    return Ok(());
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    let now = Instant::now();
                    if deadline.is_some_and(|d| now >= d) {
                        return Err(TransportError::Timeout("accept"));
                    }
                    let pause = match deadline {
                        Some(d) => self.config.accept_poll_interval.min(d.saturating_duration_since(now)),
                        None => self.config.accept_poll_interval,
                    };
                    std::thread::sleep(pause);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransportError::AcceptFailed(e)),
            }
        }
    }

    fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.link.as_mut().ok_or(TransportError::NotConnected)?.send(bytes)
    }

    fn receive_bytes(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.link.as_mut().ok_or(TransportError::NotConnected)?.poll(buf)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        self.listener = None;
        if let Some(link) = self.link.take() {
            tracing::info!(peer = %link.peer, "closing connection");
            link.shutdown();
        }
        Ok(())
    }

    fn role(&self) -> Role {
        Role::Server
    }

    fn is_connected(&self) -> bool {
        !self.closed && self.link.is_some()
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.link.as_ref().map(|link| link.peer)
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Connects outward to a known host:port.
pub struct TcpClientTransport {
    addr: SocketAddr,
    link: Option<Link>,
    config: TransportConfig,
    closed: bool,
}

impl TcpClientTransport {
    /// Creates a client for the given server address. Nothing is sent until
    /// [`wait_until_ready`](Transport::wait_until_ready).
    pub fn new(addr: SocketAddr, config: TransportConfig) -> Self {
        Self {
            addr,
            link: None,
            config: config.validated(),
            closed: false,
        }
    }

    /// Resolves `host:port` (first address wins) and creates a client for it.
    pub fn resolve(host: &str, port: u16, config: TransportConfig) -> Result<Self, TransportError> {
        let target = format!("{host}:{port}");
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|source| TransportError::ConnectFailed {
                addr: target.clone(),
                source,
            })?
            .next()
            .ok_or_else(|| TransportError::ConnectFailed {
                addr: target,
                source: std::io::Error::new(ErrorKind::NotFound, "host resolved to no addresses"),
            })?;
        Ok(Self::new(addr, config))
    }

    /// The server address this client connects to.
    pub fn server_addr(&self) -> SocketAddr {
        self.addr
    }
}

/// Errors that mean "the server isn't up yet" rather than "give up".
fn is_retryable(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::TimedOut
            | ErrorKind::Interrupted
    )
}

impl Transport for TcpClientTransport {
    fn wait_until_ready(&mut self) -> Result<(), TransportError> {
        self.wait_until_ready_within(self.config.connect_timeout)
    }

    fn wait_until_ready_within(&mut self, limit: Duration) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if self.link.is_some() {
            return Err(TransportError::AlreadyConnected);
        }

        tracing::info!(addr = %self.addr, "connecting");
        let deadline = deadline_after(self.config.connect_timeout.min(limit));

        loop {
            let remaining = match deadline {
                Some(d) => d.saturating_duration_since(Instant::now()),
                None => MAX_CONNECT_ATTEMPT,
            };
            if remaining.is_zero() {
                return Err(TransportError::Timeout("connect"));
            }

            match TcpStream::connect_timeout(&self.addr, remaining.min(MAX_CONNECT_ATTEMPT)) {
                Ok(stream) => {
                    let link = Link::new(stream, self.addr, &self.config).map_err(|source| {
                        TransportError::ConnectFailed {
                            addr: self.addr.to_string(),
                            source,
                        }
                    })?;
                    tracing::info!(addr = %self.addr, "connected");
                    self.link = Some(link);
                    return Ok(());
                }
                Err(e) if is_retryable(e.kind()) => {
                    tracing::debug!(addr = %self.addr, error = %e, "server not reachable yet");
                    let pause = match deadline {
                        Some(d) => d.saturating_duration_since(Instant::now()),
                        None => self.config.connect_retry_interval,
                    };
                    std::thread::sleep(self.config.connect_retry_interval.min(pause));
                }
                Err(source) => {
                    return Err(TransportError::ConnectFailed {
                        addr: self.addr.to_string(),
                        source,
                    });
                }
            }
        }
    }

    fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.link.as_mut().ok_or(TransportError::NotConnected)?.send(bytes)
    }

    fn receive_bytes(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.link.as_mut().ok_or(TransportError::NotConnected)?.poll(buf)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        if let Some(link) = self.link.take() {
            tracing::info!(peer = %link.peer, "closing connection");
            link.shutdown();
        }
        Ok(())
    }

    fn role(&self) -> Role {
        Role::Client
    }

    fn is_connected(&self) -> bool {
        !self.closed && self.link.is_some()
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.link.as_ref().map(|link| link.peer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconnected_transports_refuse_io() {
        let mut server =
            TcpServerTransport::bind("127.0.0.1:0", TransportConfig::default()).unwrap();
        let mut buf = [0u8; 8];
        assert!(matches!(
            server.send_bytes(b"x"),
            Err(TransportError::NotConnected)
        ));
        assert!(matches!(
            server.receive_bytes(&mut buf),
            Err(TransportError::NotConnected)
        ));
        assert!(!server.is_connected());
        assert_eq!(server.role(), Role::Server);

        let client = TcpClientTransport::new(server.local_addr(), TransportConfig::default());
        assert_eq!(client.role(), Role::Client);
        assert!(client.peer_addr().is_none());
    }

    #[test]
    fn test_bind_reports_assigned_port() {
        let server = TcpServerTransport::bind("127.0.0.1:0", TransportConfig::default()).unwrap();
        assert_ne!(server.local_addr().port(), 0);
    }

    #[test]
    fn test_accept_times_out_without_client() {
        let config = TransportConfig::with_timeout(Duration::from_millis(50));
        let mut server = TcpServerTransport::bind("127.0.0.1:0", config).unwrap();
        let started = Instant::now();
        assert!(matches!(
            server.wait_until_ready(),
            Err(TransportError::Timeout("accept"))
        ));
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_caller_limit_shortens_accept_timeout() {
        let config = TransportConfig::with_timeout(Duration::from_secs(3));
        let mut server = TcpServerTransport::bind("127.0.0.1:0", config).unwrap();
        let started = Instant::now();
        assert!(matches!(
            server.wait_until_ready_within(Duration::from_millis(50)),
            Err(TransportError::Timeout("accept"))
        ));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_unrepresentable_timeout_means_no_deadline() {
        assert!(deadline_after(Duration::MAX).is_none());
        assert!(deadline_after(Duration::from_secs(1)).is_some());

        // The caller's limit still applies when the configured one overflows.
        let config = TransportConfig::with_timeout(Duration::MAX);
        let mut server = TcpServerTransport::bind("127.0.0.1:0", config).unwrap();
        assert!(matches!(
            server.wait_until_ready_within(Duration::from_millis(20)),
            Err(TransportError::Timeout("accept"))
        ));
    }

    #[test]
    fn test_closed_transport_rejects_everything() {
        let mut server =
            TcpServerTransport::bind("127.0.0.1:0", TransportConfig::default()).unwrap();
        server.close().unwrap();
        assert!(matches!(server.wait_until_ready(), Err(TransportError::Closed)));
        assert!(matches!(server.send_bytes(b"x"), Err(TransportError::Closed)));
    }

    #[test]
    fn test_resolve_localhost() {
        let client = TcpClientTransport::resolve("127.0.0.1", 4000, TransportConfig::default())
            .unwrap();
        assert_eq!(client.server_addr(), "127.0.0.1:4000".parse().unwrap());
    }
}
