//! Advertises a waiting game by UDP broadcast.

use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::thread::JoinHandle;

use crate::{CancelToken, DiscoveryConfig, DiscoveryError, ServiceInfo};

/// Broadcasts one [`ServiceInfo`] on a background thread until stopped.
///
/// Meant to run while the game server blocks in `wait_until_ready`: start
/// it right after binding, stop it once the client is in.
pub struct DiscoveryServer {
    info: ServiceInfo,
    token: CancelToken,
    handle: Option<JoinHandle<()>>,
}

impl DiscoveryServer {
    /// Encodes `info` and starts broadcasting it every
    /// `config.broadcast_interval`.
    pub fn start(info: ServiceInfo, config: DiscoveryConfig) -> Result<Self, DiscoveryError> {
        let config = config.validated();
        let datagram = info.to_datagram()?;

        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0);
        let socket = UdpSocket::bind(bind_addr).map_err(|source| DiscoveryError::Bind {
            addr: bind_addr.to_string(),
            source,
        })?;
        socket.set_broadcast(true).map_err(DiscoveryError::Socket)?;

        let target = SocketAddrV4::new(config.broadcast_addr, config.port);
        let token = CancelToken::new();
        let thread_token = token.clone();
        let interval = config.broadcast_interval;

        let handle = std::thread::Builder::new()
            .name("salvo-discovery-broadcast".into())
            .spawn(move || broadcast_loop(socket, datagram, target, interval, thread_token))
            .map_err(DiscoveryError::Spawn)?;

        tracing::info!(%target, service = %info, "broadcasting service");
        Ok(Self {
            info,
            token,
            handle: Some(handle),
        })
    }

    /// The record being advertised.
    pub fn info(&self) -> &ServiceInfo {
        &self.info
    }

    /// Whether the broadcast thread is still up.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops broadcasting and waits for the thread to exit. Safe to call
    /// more than once.
    pub fn stop(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("broadcast thread panicked");
            }
            tracing::info!(hostname = %self.info.hostname, "stopped broadcasting");
        }
    }
}

impl Drop for DiscoveryServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn broadcast_loop(
    socket: UdpSocket,
    datagram: Vec<u8>,
    target: SocketAddrV4,
    interval: std::time::Duration,
    token: CancelToken,
) {
    let mut sent: u64 = 0;
    while !token.is_cancelled() {
        match socket.send_to(&datagram, target) {
            Ok(_) => {
                sent += 1;
                tracing::trace!(%target, sent, "broadcast");
            }
            // Best effort: a network hiccup shouldn't end the broadcast.
            Err(e) => tracing::warn!(%target, error = %e, "broadcast failed"),
        }
        if token.sleep(interval) {
            break;
        }
    }
    tracing::debug!(sent, "broadcast loop exited");
}
