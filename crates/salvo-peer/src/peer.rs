//! The network peer: one end of a two-player lockstep session.
//!
//! A [`NetworkPeer`] owns a transport, a [`MessageRegistry`] and the
//! [`LockstepState`]. The game drives it from its frame loop:
//!
//! ```text
//! startup:  register messages → wait_until_ready()
//! per frame: receive_messages()  → handlers run, queued replies go out
//!            send(...)            → framed and flushed immediately
//! shutdown: disconnect()
//! ```
//!
//! Only the turn owner may send `Lockstep` packets. Sending one (with
//! passing enabled) hands the turn to the other peer by following it with a
//! `LockstepPassing` packet.

use std::collections::VecDeque;

use salvo_protocol::{
    AnyMessage, Disconnect, FrameStatus, LockstepPassing, NetworkMessage, NetworkReader,
    NetworkWriter, ProtocolError, SendMode, SetClientId, split_frame, write_packet,
};
use salvo_transport::{Role, Transport};

use crate::context::Outgoing;
use crate::{LockstepState, MessageRegistry, PeerConfig, PeerContext, PeerError, PeerId};

/// What a send call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The packet went out; ownership is unchanged.
    Sent,
    /// The packet went out, followed by `LockstepPassing`. The other peer
    /// owns the turn now.
    SentAndPassed,
    /// A `Lockstep` send was attempted without owning the turn. Nothing was
    /// written.
    NotOwner,
}

impl SendOutcome {
    /// `true` if bytes were written to the transport.
    pub fn was_sent(self) -> bool {
        !matches!(self, Self::NotOwner)
    }
}

/// One end of the session.
pub struct NetworkPeer<T: Transport> {
    transport: T,
    registry: MessageRegistry,
    state: LockstepState,
    config: PeerConfig,
    tx_buf: Vec<u8>,
    rx_buf: Vec<u8>,
    rx_filled: usize,
    outbox: VecDeque<Outgoing>,
    closed: bool,
}

impl<T: Transport> NetworkPeer<T> {
    /// Wraps `transport` in a peer whose registry already knows the
    /// built-in messages.
    ///
    /// The role (and so the initial turn) comes from the transport.
    pub fn new(transport: T, config: PeerConfig) -> Self {
        let config = config.validated();
        let role = transport.role();
        tracing::debug!(%role, buffer_capacity = config.buffer_capacity, "creating peer");

        Self {
            transport,
            registry: builtin_registry(),
            state: LockstepState::new(role),
            tx_buf: vec![0; config.buffer_capacity],
            rx_buf: vec![0; config.buffer_capacity],
            rx_filled: 0,
            outbox: VecDeque::new(),
            closed: false,
            config,
        }
    }

    // -----------------------------------------------------------------------
    // Handshake
    // -----------------------------------------------------------------------

    /// Blocks until the other peer is connected, for at most
    /// [`PeerConfig::handshake_timeout`] or the transport's own timeout,
    /// whichever is sooner.
    ///
    /// The server then tells the client its id with `SetClientId` (Extra
    /// mode). The server keeps the turn.
    pub fn wait_until_ready(&mut self) -> Result<(), PeerError> {
        if self.closed {
            return Err(PeerError::NotReady);
        }
        if let Err(e) = self
            .transport
            .wait_until_ready_within(self.config.handshake_timeout)
        {
            self.state.set_ready(false);
            return Err(e.into());
        }
        self.state.set_ready(true);

        let role = self.role();
        tracing::info!(%role, peer_id = %self.state.peer_id(), "peer ready");

        if role == Role::Server {
            let assign = SetClientId {
                id: self.state.peer_id().next().0,
            };
            transmit(
                &mut self.transport,
                &mut self.tx_buf,
                &mut self.state,
                &assign,
                SendMode::Extra,
                false,
            )?;
            tracing::info!(client_id = assign.id, "assigned client id");
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Sending
    // -----------------------------------------------------------------------

    /// Sends `message`, passing the turn afterwards if `mode` is
    /// [`SendMode::Lockstep`].
    pub fn send<M: NetworkMessage>(
        &mut self,
        message: &M,
        mode: SendMode,
    ) -> Result<SendOutcome, PeerError> {
        self.send_with(message, mode, true)
    }

    /// Sends `message`.
    ///
    /// A `Lockstep` send by a peer that doesn't own the turn writes nothing
    /// and returns [`SendOutcome::NotOwner`]. With `pass_lockstep` set, a
    /// successful `Lockstep` send is followed by a separate
    /// `LockstepPassing` packet and this peer gives up the turn.
    ///
    /// # Errors
    /// [`PeerError::NotReady`] before the handshake or after a disconnect;
    /// [`PeerError::Protocol`] if the message doesn't fit the transmit
    /// buffer; [`PeerError::Transport`] if the write fails.
    pub fn send_with<M: NetworkMessage>(
        &mut self,
        message: &M,
        mode: SendMode,
        pass_lockstep: bool,
    ) -> Result<SendOutcome, PeerError> {
        self.ensure_ready()?;
        transmit(
            &mut self.transport,
            &mut self.tx_buf,
            &mut self.state,
            message,
            mode,
            pass_lockstep,
        )
    }

    /// Hands the turn to the other peer without sending anything else.
    pub fn pass_lockstep(&mut self) -> Result<SendOutcome, PeerError> {
        self.ensure_ready()?;
        if !self.state.is_current_owner() {
            tracing::warn!("cannot pass the lockstep: not the current owner");
            return Ok(SendOutcome::NotOwner);
        }
        pass_turn(&mut self.transport, &mut self.tx_buf, &mut self.state)?;
        Ok(SendOutcome::SentAndPassed)
    }

    // -----------------------------------------------------------------------
    // Receiving
    // -----------------------------------------------------------------------

    /// Reads whatever the transport has queued and dispatches every
    /// complete packet, in wire order, on the calling thread.
    ///
    /// Never blocks. Reads at most one receive buffer's worth of bytes per
    /// call; the rest waits for the next call. Returns the number of handlers
    /// invoked. A packet split across reads is kept until the rest arrives. Packets with an
    /// unregistered id or a malformed payload are logged and skipped.
    ///
    /// # Errors
    /// [`PeerError::Transport`] if reading fails (the peer is marked not
    /// ready). [`PeerError::Protocol`] with [`ProtocolError::Desync`] if the
    /// stream can't be re-synchronised; everything buffered is dropped.
    pub fn receive_messages(&mut self) -> Result<usize, PeerError> {
        if self.closed {
            return Ok(0);
        }

        let mut dispatched = 0;
        let mut budget = self.rx_buf.len();
        while budget > 0 {
            let end = self.rx_buf.len().min(self.rx_filled + budget);
            let free = &mut self.rx_buf[self.rx_filled..end];
            if free.is_empty() {
                break;
            }
            let read = match self.transport.receive_bytes(free) {
                Ok(read) => read,
                Err(e) => {
                    self.state.set_ready(false);
                    return Err(e.into());
                }
            };
            if read == 0 {
                break;
            }
            self.rx_filled += read;
            budget -= read;
            dispatched += self.process_buffered()?;
        }

        // Anything a handler queued that was waiting on the turn.
        flush_outbox(
            &mut self.transport,
            &mut self.tx_buf,
            &mut self.state,
            &mut self.outbox,
        )?;
        Ok(dispatched)
    }

    /// Dispatches every complete frame in the receive buffer and moves any
    /// trailing partial frame to the front.
    fn process_buffered(&mut self) -> Result<usize, PeerError> {
        let role = self.role();
        let max_payload = self.config.max_payload();
        let mut offset = 0;
        let mut dispatched = 0;

        let result = loop {
            if offset >= self.rx_filled {
                break Ok(());
            }
            let (header, payload, consumed) =
                match split_frame(&self.rx_buf[offset..self.rx_filled], max_payload) {
                    Ok(FrameStatus::Complete {
                        header,
                        payload,
                        consumed,
                    }) => (header, payload, consumed),
                    Ok(FrameStatus::Incomplete) => break Ok(()),
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            discarded = self.rx_filled - offset,
                            "receive stream desynchronised, dropping buffered bytes"
                        );
                        self.rx_filled = 0;
                        return Err(ProtocolError::Desync(e.to_string()).into());
                    }
                };
            offset += consumed;

            let id = header.type_id;
            if header.mode == SendMode::Lockstep
                && self.state.is_current_owner()
                && id != LockstepPassing::TYPE_ID
            {
                tracing::warn!(%id, "lockstep packet received while holding the turn");
            }

            let mut reader = NetworkReader::new(payload);
            let mut ctx = PeerContext::new(&mut self.state, &mut self.outbox, role);
            match self.registry.dispatch(id, &mut reader, &mut ctx) {
                Ok(()) => {
                    dispatched += 1;
                    tracing::debug!(
                        %id,
                        message = self.registry.name_of(id).unwrap_or("?"),
                        mode = %header.mode,
                        "dispatched"
                    );
                }
                Err(ProtocolError::UnknownType(id)) => {
                    tracing::error!(%id, len = payload.len(), "unregistered message type, skipping");
                    continue;
                }
                Err(e) => {
                    tracing::error!(%id, error = %e, "malformed message, skipping");
                    continue;
                }
            }

            if let Err(e) = flush_outbox(
                &mut self.transport,
                &mut self.tx_buf,
                &mut self.state,
                &mut self.outbox,
            ) {
                break Err(e);
            }
        };

        self.rx_buf.copy_within(offset..self.rx_filled, 0);
        self.rx_filled -= offset;
        result.map(|()| dispatched)
    }

    // -----------------------------------------------------------------------
    // Shutdown
    // -----------------------------------------------------------------------

    /// Tells the other peer we're leaving (`Disconnect`, Extra mode), marks
    /// this peer not ready and closes the transport. Calling it again does
    /// nothing.
    ///
    /// If the other peer already disconnected, nothing is sent.
    pub fn disconnect(&mut self) -> Result<(), PeerError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let notified = if self.state.is_ready() && self.transport.is_connected() {
            transmit(
                &mut self.transport,
                &mut self.tx_buf,
                &mut self.state,
                &Disconnect,
                SendMode::Extra,
                false,
            )
            .map(|_| ())
        } else {
            Ok(())
        };

        self.state.set_ready(false);
        self.outbox.clear();
        self.transport.close()?;
        tracing::info!(role = %self.role(), "disconnected");
        notified
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The peer's lockstep state.
    pub fn state(&self) -> &LockstepState {
        &self.state
    }

    /// `true` between the handshake and a disconnect or transport failure.
    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// `true` if a `Lockstep` send would go out now.
    pub fn is_current_owner(&self) -> bool {
        self.state.is_current_owner()
    }

    /// 0 on the server. A client reads 0 until `SetClientId` arrives.
    pub fn peer_id(&self) -> PeerId {
        self.state.peer_id()
    }

    /// Server or client, as decided by the transport.
    pub fn role(&self) -> Role {
        self.transport.role()
    }

    /// The registered message types, built-ins included.
    pub fn registry(&self) -> &MessageRegistry {
        &self.registry
    }

    /// Register application messages here before the first send or receive.
    pub fn registry_mut(&mut self) -> &mut MessageRegistry {
        &mut self.registry
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The validated configuration this peer was built with.
    pub fn config(&self) -> &PeerConfig {
        &self.config
    }

    /// Sends queued by handlers that are still waiting for the turn.
    pub fn queued(&self) -> usize {
        self.outbox.len()
    }

    fn ensure_ready(&self) -> Result<(), PeerError> {
        if self.closed || !self.state.is_ready() {
            return Err(PeerError::NotReady);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Built-in handlers
// ---------------------------------------------------------------------------

fn builtin_registry() -> MessageRegistry {
    let mut registry = MessageRegistry::new();
    // Distinct reserved ids in an empty registry, so this can't conflict.
    if let Err(e) = register_builtins(&mut registry) {
        tracing::error!(error = %e, "failed to register built-in messages");
    }
    registry
}

fn register_builtins(registry: &mut MessageRegistry) -> Result<(), ProtocolError> {
    registry.register::<LockstepPassing, _>(on_lockstep_passing)?;
    registry.register::<SetClientId, _>(on_set_client_id)?;
    registry.register::<Disconnect, _>(on_disconnect)
}

fn on_lockstep_passing(_: LockstepPassing, ctx: &mut PeerContext<'_>) {
    if ctx.is_current_owner() {
        tracing::warn!("received LockstepPassing while already holding the turn");
    }
    ctx.state_mut().take_turn();
    tracing::debug!(peer_id = %ctx.peer_id(), "lockstep received");
}

fn on_set_client_id(message: SetClientId, ctx: &mut PeerContext<'_>) {
    if ctx.role() == Role::Server {
        tracing::warn!(id = message.id, "server received SetClientId, ignoring");
        return;
    }
    ctx.state_mut().set_peer_id(PeerId(message.id));
    tracing::info!(peer_id = message.id, "received client id");
}

fn on_disconnect(_: Disconnect, ctx: &mut PeerContext<'_>) {
    ctx.state_mut().set_ready(false);
    tracing::info!("remote peer disconnected");
}

// ---------------------------------------------------------------------------
// Transmission
// ---------------------------------------------------------------------------
//
// Free functions over the peer's fields so they can run while the receive
// buffer is borrowed.

fn transmit<T: Transport>(
    transport: &mut T,
    tx_buf: &mut [u8],
    state: &mut LockstepState,
    message: &dyn AnyMessage,
    mode: SendMode,
    pass_lockstep: bool,
) -> Result<SendOutcome, PeerError> {
    if mode == SendMode::Lockstep && !state.is_current_owner() {
        tracing::warn!(
            message = message.message_name(),
            "lockstep send rejected: not the current owner"
        );
        return Ok(SendOutcome::NotOwner);
    }

    let mut writer = NetworkWriter::new(tx_buf);
    write_packet(&mut writer, mode, message.wire_id(), Some(message))?;
    send_frame(transport, state, writer.as_written())?;
    tracing::debug!(
        id = %message.wire_id(),
        message = message.message_name(),
        %mode,
        bytes = writer.written(),
        "sent"
    );

    if mode == SendMode::Lockstep && pass_lockstep {
        pass_turn(transport, tx_buf, state)?;
        return Ok(SendOutcome::SentAndPassed);
    }
    Ok(SendOutcome::Sent)
}

/// Sends `LockstepPassing` while still owning the turn, then gives it up.
fn pass_turn<T: Transport>(
    transport: &mut T,
    tx_buf: &mut [u8],
    state: &mut LockstepState,
) -> Result<(), PeerError> {
    let mut writer = NetworkWriter::new(tx_buf);
    write_packet(
        &mut writer,
        SendMode::Lockstep,
        LockstepPassing::TYPE_ID,
        Some(&LockstepPassing),
    )?;
    send_frame(transport, state, writer.as_written())?;
    state.pass_turn();
    tracing::debug!(peer_id = %state.peer_id(), "lockstep passed");
    Ok(())
}

fn send_frame<T: Transport>(
    transport: &mut T,
    state: &mut LockstepState,
    bytes: &[u8],
) -> Result<(), PeerError> {
    if let Err(e) = transport.send_bytes(bytes) {
        state.set_ready(false);
        return Err(e.into());
    }
    Ok(())
}

/// Sends queued entries front to back, stopping at the first one that
/// needs a turn this peer doesn't hold.
fn flush_outbox<T: Transport>(
    transport: &mut T,
    tx_buf: &mut [u8],
    state: &mut LockstepState,
    outbox: &mut VecDeque<Outgoing>,
) -> Result<(), PeerError> {
    loop {
        let blocked = match outbox.front() {
            None => return Ok(()),
            Some(next) => next.needs_turn() && !state.is_current_owner(),
        };
        if blocked {
            tracing::debug!(queued = outbox.len(), "holding queued sends until the turn arrives");
            return Ok(());
        }
        let Some(next) = outbox.pop_front() else {
            return Ok(());
        };

        match next {
            Outgoing::Message {
                message,
                mode,
                pass_lockstep,
            } => {
                transmit(transport, tx_buf, state, message.as_ref(), mode, pass_lockstep)?;
            }
            Outgoing::PassLockstep => pass_turn(transport, tx_buf, state)?,
        }
    }
}

#[cfg(test)]
mod tests {
    use salvo_protocol::{HEADER_LEN, NetworkWriter, WireTypeId};
    use salvo_transport::memory::{self, MemoryTransport, MemoryWire};

    use super::*;

    fn ready_server() -> (NetworkPeer<MemoryTransport>, MemoryWire, MemoryWire) {
        let (server, client) = memory::pair();
        let server_wire = server.wire();
        let client_wire = client.wire();
        let mut peer = NetworkPeer::new(server, PeerConfig::default());
        peer.wait_until_ready().unwrap();
        // Drop the SetClientId the handshake sent.
        server_wire.take_outbound();
        (peer, server_wire, client_wire)
    }

    fn frame(mode: SendMode, id: WireTypeId, payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_LEN + payload.len()];
        let mut w = NetworkWriter::new(&mut buf);
        w.write(mode.as_byte()).unwrap();
        w.write(id.0).unwrap();
        w.write(payload.len() as u32).unwrap();
        w.write_bytes(payload).unwrap();
        buf
    }

    #[test]
    fn test_builtins_are_registered() {
        let (server, _client) = memory::pair();
        let peer = NetworkPeer::new(server, PeerConfig::default());
        assert_eq!(
            peer.registry().type_ids(),
            vec![Disconnect::TYPE_ID, SetClientId::TYPE_ID, LockstepPassing::TYPE_ID]
        );
    }

    #[test]
    fn test_send_before_handshake_is_not_ready() {
        let (server, _client) = memory::pair();
        let mut peer = NetworkPeer::new(server, PeerConfig::default());
        assert!(matches!(
            peer.send(&Disconnect, SendMode::Extra),
            Err(PeerError::NotReady)
        ));
    }

    #[test]
    fn test_server_handshake_sends_set_client_id() {
        let (server, _client) = memory::pair();
        let wire = server.wire();
        let mut peer = NetworkPeer::new(server, PeerConfig::default());
        peer.wait_until_ready().unwrap();

        assert_eq!(
            wire.take_outbound(),
            frame(SendMode::Extra, SetClientId::TYPE_ID, &1i32.to_le_bytes())
        );
        assert!(peer.is_current_owner());
        assert!(peer.is_ready());
    }

    #[test]
    fn test_lockstep_send_with_pass_writes_two_frames() {
        let (mut peer, wire, _) = ready_server();
        let outcome = peer.send(&SetClientId { id: 9 }, SendMode::Lockstep).unwrap();

        assert_eq!(outcome, SendOutcome::SentAndPassed);
        assert!(!peer.is_current_owner());
        let mut expected = frame(SendMode::Lockstep, SetClientId::TYPE_ID, &9i32.to_le_bytes());
        expected.extend(frame(SendMode::Lockstep, LockstepPassing::TYPE_ID, &[]));
        assert_eq!(wire.take_outbound(), expected);
    }

    #[test]
    fn test_non_owner_lockstep_send_writes_nothing() {
        let (mut peer, wire, _) = ready_server();
        peer.pass_lockstep().unwrap();
        wire.take_outbound();

        let outcome = peer.send(&SetClientId { id: 1 }, SendMode::Lockstep).unwrap();
        assert_eq!(outcome, SendOutcome::NotOwner);
        assert!(!outcome.was_sent());
        assert_eq!(wire.pending_outbound(), 0);
    }

    #[test]
    fn test_extra_send_ignores_ownership() {
        let (mut peer, wire, _) = ready_server();
        peer.pass_lockstep().unwrap();
        wire.take_outbound();

        assert_eq!(
            peer.send(&SetClientId { id: 1 }, SendMode::Extra).unwrap(),
            SendOutcome::Sent
        );
        assert_eq!(wire.pending_outbound(), HEADER_LEN + 4);
        assert!(!peer.is_current_owner());
    }

    #[test]
    fn test_lockstep_send_without_pass_keeps_turn() {
        let (mut peer, _, _) = ready_server();
        let outcome = peer
            .send_with(&SetClientId { id: 1 }, SendMode::Lockstep, false)
            .unwrap();
        assert_eq!(outcome, SendOutcome::Sent);
        assert!(peer.is_current_owner());
    }

    #[test]
    fn test_receiving_lockstep_passing_takes_turn() {
        let (mut peer, wire, _) = ready_server();
        peer.pass_lockstep().unwrap();
        assert!(!peer.is_current_owner());

        wire.inject(&frame(SendMode::Lockstep, LockstepPassing::TYPE_ID, &[]));
        assert_eq!(peer.receive_messages().unwrap(), 1);
        assert!(peer.is_current_owner());
    }

    #[test]
    fn test_empty_socket_dispatches_nothing() {
        let (mut peer, _, _) = ready_server();
        assert_eq!(peer.receive_messages().unwrap(), 0);
    }

    #[test]
    fn test_invalid_mode_is_desync_and_clears_buffer() {
        let (mut peer, wire, _) = ready_server();
        let mut bad = frame(SendMode::Extra, Disconnect::TYPE_ID, &[]);
        bad[0] = 5;
        wire.inject(&bad);

        assert!(matches!(
            peer.receive_messages(),
            Err(PeerError::Protocol(ProtocolError::Desync(_)))
        ));
        // The next poll starts from a clean buffer.
        wire.inject(&frame(SendMode::Extra, Disconnect::TYPE_ID, &[]));
        assert_eq!(peer.receive_messages().unwrap(), 1);
        assert!(!peer.is_ready());
    }

    #[test]
    fn test_oversized_frame_is_desync() {
        let (server, _client) = memory::pair();
        let wire = server.wire();
        let mut peer = NetworkPeer::new(
            server,
            PeerConfig {
                buffer_capacity: 1024,
                ..Default::default()
            },
        );
        peer.wait_until_ready().unwrap();

        let mut header = frame(SendMode::Extra, WireTypeId(50), &[]);
        header[5..9].copy_from_slice(&4096u32.to_le_bytes());
        wire.inject(&header);
        assert!(matches!(
            peer.receive_messages(),
            Err(PeerError::Protocol(ProtocolError::Desync(_)))
        ));
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let (mut peer, wire, _) = ready_server();
        peer.disconnect().unwrap();
        assert_eq!(
            wire.take_outbound(),
            frame(SendMode::Extra, Disconnect::TYPE_ID, &[])
        );
        assert!(!peer.is_ready());

        peer.disconnect().unwrap();
        assert_eq!(wire.pending_outbound(), 0);
        assert_eq!(peer.receive_messages().unwrap(), 0);
        assert!(matches!(
            peer.send(&Disconnect, SendMode::Extra),
            Err(PeerError::NotReady)
        ));
    }

    #[test]
    fn test_server_ignores_set_client_id() {
        let (mut peer, wire, _) = ready_server();
        wire.inject(&frame(SendMode::Extra, SetClientId::TYPE_ID, &7i32.to_le_bytes()));
        assert_eq!(peer.receive_messages().unwrap(), 1);
        assert_eq!(peer.peer_id(), PeerId::SERVER);
    }
}
