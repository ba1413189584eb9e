//! Listens for broadcast games.

use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};

use crate::{
    CancelToken, DiscoveryConfig, DiscoveryError, MAX_DATAGRAM, ServiceInfo, ServiceList,
};

/// Collects advertised services on a background thread.
///
/// The socket uses address (and, on unix, port) reuse, so several clients
/// on one machine can listen on the discovery port at the same time.
pub struct DiscoveryClient {
    services: Arc<Mutex<ServiceList>>,
    local_addr: SocketAddr,
    token: CancelToken,
    handle: Option<JoinHandle<()>>,
}

impl DiscoveryClient {
    /// Binds the discovery port and starts listening.
    pub fn start(config: DiscoveryConfig) -> Result<Self, DiscoveryError> {
        let config = config.validated();
        let socket = bind_reusable(config.port)?;
        socket
            .set_read_timeout(Some(config.receive_timeout))
            .map_err(DiscoveryError::Socket)?;
        let local_addr = socket.local_addr().map_err(DiscoveryError::Socket)?;

        let services = Arc::new(Mutex::new(ServiceList::new()));
        let token = CancelToken::new();
        let thread_services = services.clone();
        let thread_token = token.clone();

        let handle = std::thread::Builder::new()
            .name("salvo-discovery-listen".into())
            .spawn(move || receive_loop(socket, thread_services, thread_token))
            .map_err(DiscoveryError::Spawn)?;

        tracing::info!(%local_addr, "listening for services");
        Ok(Self {
            services,
            local_addr,
            token,
            handle: Some(handle),
        })
    }

    /// A snapshot of the services found so far.
    pub fn services(&self) -> Vec<ServiceInfo> {
        self.services.lock().as_slice().to_vec()
    }

    /// How many distinct hosts have been heard from.
    pub fn service_count(&self) -> usize {
        self.services.lock().len()
    }

    /// Address the listening socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Whether the listener thread is still up.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops listening and waits for the thread to exit. Returns within
    /// about one receive timeout. Safe to call more than once.
    pub fn stop(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("discovery listener thread panicked");
            }
            tracing::info!(found = self.service_count(), "stopped listening for services");
        }
    }
}

impl Drop for DiscoveryClient {
    fn drop(&mut self) {
        self.stop();
    }
}

fn bind_reusable(port: u16) -> Result<UdpSocket, DiscoveryError> {
    let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(DiscoveryError::Socket)?;
    socket
        .set_reuse_address(true)
        .map_err(DiscoveryError::Socket)?;
    #[cfg(unix)]
    {
        if let Err(e) = socket.set_reuse_port(true) {
            tracing::warn!(error = %e, "SO_REUSEPORT unavailable, only one listener per host");
        }
    }
    socket
        .bind(&SocketAddr::V4(addr).into())
        .map_err(|source| DiscoveryError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    Ok(socket.into())
}

fn receive_loop(socket: UdpSocket, services: Arc<Mutex<ServiceList>>, token: CancelToken) {
    let mut buf = [0u8; MAX_DATAGRAM];
    while !token.is_cancelled() {
        let (len, from) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => continue,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!(error = %e, "discovery receive failed");
                // Don't spin on a persistent error.
                token.sleep(Duration::from_millis(50));
                continue;
            }
        };

        let info = match ServiceInfo::from_datagram(&buf[..len]) {
            Ok(info) => info,
            Err(e) => {
                tracing::debug!(%from, len, error = %e, "dropping malformed datagram");
                continue;
            }
        };

        if services.lock().insert(info.clone()) {
            tracing::info!(%from, service = %info, "discovered service");
        }
    }
    tracing::debug!("discovery listener exited");
}
