//! Lockstep peer for Salvo.
//!
//! A [`NetworkPeer`] is one end of a two-player session. It frames outgoing
//! messages onto a [`Transport`](salvo_transport::Transport), reassembles
//! incoming packets from the byte stream and hands each to the handler
//! registered for its wire id.
//!
//! # Lockstep
//!
//! Exactly one peer owns the turn at a time. The server starts with it.
//! `Lockstep`-mode packets may only be sent by the owner, and sending one
//! passes the turn to the other side. `Extra`-mode packets are unrestricted.
//!
//! # How it fits in the stack
//!
//! ```text
//! Game (above)        ← registers messages, polls once per frame
//!     ↕
//! Peer (this crate)   ← registry, lockstep state, dispatch
//!     ↕
//! Protocol / Transport (below) ← frames and bytes
//! ```

mod config;
mod context;
mod error;
mod peer;
mod registry;
mod state;

pub use config::PeerConfig;
pub use context::PeerContext;
pub use error::PeerError;
pub use peer::{NetworkPeer, SendOutcome};
pub use registry::{MessageConstructor, MessageHandler, MessageRegistry};
pub use state::{LockstepState, PeerId, Turn};
