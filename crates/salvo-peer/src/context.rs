//! What a message handler gets to see and do.
//!
//! Handlers run in the middle of [`NetworkPeer::receive_messages`], while
//! the peer is busy walking its receive buffer, so they can't call back
//! into the peer. Instead each handler is given a [`PeerContext`]: a
//! read-only view of the lockstep state plus an outbox. Messages queued on
//! the outbox are sent as soon as the handler returns.
//!
//! [`NetworkPeer::receive_messages`]: crate::NetworkPeer::receive_messages

use std::collections::VecDeque;

use salvo_protocol::{AnyMessage, NetworkMessage, SendMode};
use salvo_transport::Role;

use crate::{LockstepState, PeerId};

/// A send queued by a handler.
pub(crate) enum Outgoing {
    Message {
        message: Box<dyn AnyMessage>,
        mode: SendMode,
        pass_lockstep: bool,
    },
    PassLockstep,
}

impl Outgoing {
    /// `true` if this entry may only go out while the peer owns the turn.
    pub(crate) fn needs_turn(&self) -> bool {
        match self {
            Self::Message { mode, .. } => *mode == SendMode::Lockstep,
            Self::PassLockstep => true,
        }
    }
}

/// Handle given to every message handler.
pub struct PeerContext<'a> {
    state: &'a mut LockstepState,
    outbox: &'a mut VecDeque<Outgoing>,
    role: Role,
}

impl<'a> PeerContext<'a> {
    pub(crate) fn new(
        state: &'a mut LockstepState,
        outbox: &'a mut VecDeque<Outgoing>,
        role: Role,
    ) -> Self {
        Self {
            state,
            outbox,
            role,
        }
    }

    /// The peer's lockstep state as of this handler call.
    pub fn state(&self) -> &LockstepState {
        self.state
    }

    /// Whether the peer holds the turn right now.
    pub fn is_current_owner(&self) -> bool {
        self.state.is_current_owner()
    }

    /// The peer's id, updated by `SetClientId`.
    pub fn peer_id(&self) -> PeerId {
        self.state.peer_id()
    }

    /// Which side of the session the handler runs on.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Queues `message`, passing the lockstep afterwards if `mode` is
    /// [`SendMode::Lockstep`].
    ///
    /// `Lockstep` entries wait in the outbox until this peer owns the turn,
    /// and everything queued behind them waits too, so the remote sees
    /// queued messages in the order they were queued.
    pub fn send<M: NetworkMessage>(&mut self, message: M, mode: SendMode) {
        self.send_with(message, mode, true);
    }

    /// Like [`send`](Self::send) with explicit control over passing.
    pub fn send_with<M: NetworkMessage>(&mut self, message: M, mode: SendMode, pass_lockstep: bool) {
        self.outbox.push_back(Outgoing::Message {
            message: Box::new(message),
            mode,
            pass_lockstep,
        });
    }

    /// Queues a bare hand-over of the turn.
    pub fn pass_lockstep(&mut self) {
        self.outbox.push_back(Outgoing::PassLockstep);
    }

    /// Number of sends queued and not yet flushed.
    pub fn queued(&self) -> usize {
        self.outbox.len()
    }

    pub(crate) fn state_mut(&mut self) -> &mut LockstepState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use salvo_protocol::{Disconnect, SetClientId};

    use super::*;

    #[test]
    fn test_send_queues_in_order() {
        let mut state = LockstepState::new(Role::Client);
        let mut outbox = VecDeque::new();
        let mut ctx = PeerContext::new(&mut state, &mut outbox, Role::Client);

        ctx.send(SetClientId { id: 4 }, SendMode::Lockstep);
        ctx.send(Disconnect, SendMode::Extra);
        ctx.pass_lockstep();
        assert_eq!(ctx.queued(), 3);

        let needs: Vec<bool> = outbox.iter().map(Outgoing::needs_turn).collect();
        assert_eq!(needs, vec![true, false, true]);
    }

    #[test]
    fn test_context_reflects_state() {
        let mut state = LockstepState::new(Role::Server);
        let mut outbox = VecDeque::new();
        let ctx = PeerContext::new(&mut state, &mut outbox, Role::Server);
        assert!(ctx.is_current_owner());
        assert_eq!(ctx.peer_id(), PeerId::SERVER);
        assert_eq!(ctx.role(), Role::Server);
    }
}
