//! Lockstep state: readiness, turn ownership and peer identity.

use std::fmt;

use salvo_transport::Role;

// ---------------------------------------------------------------------------
// PeerId
// ---------------------------------------------------------------------------

/// Identifies a peer within the session. The server is always `PeerId(0)`;
/// the client learns its id from the server's `SetClientId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PeerId(pub i32);

impl PeerId {
    /// The server's id.
    pub const SERVER: PeerId = PeerId(0);

    /// The id the server hands to the client after this one.
    pub fn next(self) -> PeerId {
        PeerId(self.0 + 1)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Turn
// ---------------------------------------------------------------------------

/// Which side of the lockstep token this peer is on.
///
/// ```text
///   Holding ──(send Lockstep + pass, or pass_lockstep)──→ Passed
///      ↑                                                    │
///      └───────────(receive LockstepPassing)────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Turn {
    /// This peer owns the turn and may send `Lockstep` packets.
    Holding,
    /// The other peer owns the turn.
    Passed,
}

// ---------------------------------------------------------------------------
// LockstepState
// ---------------------------------------------------------------------------

/// Per-peer session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockstepState {
    ready: bool,
    turn: Turn,
    peer_id: PeerId,
}

impl LockstepState {
    /// Initial state for the given side: the server starts holding the turn,
    /// the client starts without it. Neither is ready yet.
    pub fn new(role: Role) -> Self {
        let turn = match role {
            Role::Server => Turn::Holding,
            Role::Client => Turn::Passed,
        };
        Self {
            ready: false,
            turn,
            peer_id: PeerId::SERVER,
        }
    }

    /// `true` between a successful handshake and a disconnect (either side)
    /// or transport failure.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Whether this peer holds the turn or has passed it.
    pub fn turn(&self) -> Turn {
        self.turn
    }

    /// `true` if this peer may send `Lockstep` packets right now.
    pub fn is_current_owner(&self) -> bool {
        self.turn == Turn::Holding
    }

    /// This peer's id: 0 on the server, the assigned id on a client.
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub(crate) fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    pub(crate) fn take_turn(&mut self) {
        self.turn = Turn::Holding;
    }

    pub(crate) fn pass_turn(&mut self) {
        self.turn = Turn::Passed;
    }

    pub(crate) fn set_peer_id(&mut self, id: PeerId) {
        self.peer_id = id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_starts_holding() {
        let state = LockstepState::new(Role::Server);
        assert!(state.is_current_owner());
        assert_eq!(state.peer_id(), PeerId::SERVER);
        assert!(!state.is_ready());
    }

    #[test]
    fn test_client_starts_passed() {
        let state = LockstepState::new(Role::Client);
        assert!(!state.is_current_owner());
        assert_eq!(state.turn(), Turn::Passed);
    }

    #[test]
    fn test_turn_transitions() {
        let mut state = LockstepState::new(Role::Server);
        state.pass_turn();
        assert!(!state.is_current_owner());
        state.take_turn();
        assert!(state.is_current_owner());
    }

    #[test]
    fn test_next_peer_id() {
        assert_eq!(PeerId::SERVER.next(), PeerId(1));
        assert_eq!(PeerId(1).to_string(), "1");
    }
}
