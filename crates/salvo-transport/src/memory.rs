//! In-process transport pair.
//!
//! Two [`MemoryTransport`]s share a pair of byte queues, one per direction.
//! Nothing touches the network, so peers built on it are fully
//! deterministic: bytes sent by one side are readable by the other on the
//! very next `receive_bytes` call.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{Role, Transport, TransportError};

type Queue = Arc<Mutex<VecDeque<u8>>>;

/// One end of an in-memory connection. Create both ends with [`pair`].
pub struct MemoryTransport {
    role: Role,
    inbound: Queue,
    outbound: Queue,
    connected: bool,
    closed: bool,
    read_limit: Option<usize>,
}

/// Creates a connected `(server, client)` pair.
///
/// Both ends still need `wait_until_ready`, which succeeds immediately.
pub fn pair() -> (MemoryTransport, MemoryTransport) {
    let to_client: Queue = Arc::default();
    let to_server: Queue = Arc::default();

    let server = MemoryTransport::new(Role::Server, to_server.clone(), to_client.clone());
    let client = MemoryTransport::new(Role::Client, to_client, to_server);
    (server, client)
}

impl MemoryTransport {
    fn new(role: Role, inbound: Queue, outbound: Queue) -> Self {
        Self {
            role,
            inbound,
            outbound,
            connected: false,
            closed: false,
            read_limit: None,
        }
    }

    /// Caps how many bytes a single `receive_bytes` call returns, to
    /// simulate a stream that delivers frames in fragments.
    pub fn with_read_limit(mut self, limit: usize) -> Self {
        self.read_limit = Some(limit.max(1));
        self
    }

    /// A handle on this end's queues, usable after the transport has been
    /// moved into a peer.
    pub fn wire(&self) -> MemoryWire {
        MemoryWire {
            inbound: self.inbound.clone(),
            outbound: self.outbound.clone(),
        }
    }
}

impl Transport for MemoryTransport {
    fn wait_until_ready(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if self.connected {
            return Err(TransportError::AlreadyConnected);
        }
        self.connected = true;
        Ok(())
    }

    fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        self.outbound.lock().extend(bytes.iter().copied());
        Ok(())
    }

    fn receive_bytes(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if !self.connected {
            return Err(TransportError::NotConnected);
        }

        let mut inbound = self.inbound.lock();
        let mut count = buf.len().min(inbound.len());
        if let Some(limit) = self.read_limit {
            count = count.min(limit);
        }
        for (slot, byte) in buf.iter_mut().zip(inbound.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        self.connected = false;
        Ok(())
    }

    fn role(&self) -> Role {
        self.role
    }

    fn is_connected(&self) -> bool {
        self.connected && !self.closed
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }
}

/// Side door into a [`MemoryTransport`]'s queues.
#[derive(Clone)]
pub struct MemoryWire {
    inbound: Queue,
    outbound: Queue,
}

impl MemoryWire {
    /// Appends raw bytes as if the remote had sent them.
    pub fn inject(&self, bytes: &[u8]) {
        self.inbound.lock().extend(bytes.iter().copied());
    }

    /// Bytes this end has sent that the remote hasn't read yet.
    pub fn pending_outbound(&self) -> usize {
        self.outbound.lock().len()
    }

    /// Removes and returns everything this end has sent that the remote
    /// hasn't read yet.
    pub fn take_outbound(&self) -> Vec<u8> {
        self.outbound.lock().drain(..).collect()
    }

    /// Bytes queued for this end that it hasn't read yet.
    pub fn pending_inbound(&self) -> usize {
        self.inbound.lock().len()
    }
}
