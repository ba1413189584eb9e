//! Wire protocol for Salvo.
//!
//! This crate defines the bytes two peers exchange:
//!
//! - **Cursors** ([`NetworkWriter`], [`NetworkReader`]): bounds-checked,
//!   little-endian encoding of fixed-layout fields.
//! - **Messages** ([`NetworkMessage`], [`WireTypeId`], [`SendMode`]): what a
//!   message is and how it's identified.
//! - **Framing** ([`write_packet`], [`split_frame`], [`PacketHeader`]): how
//!   messages are laid out on a byte stream.
//! - **Built-ins** ([`LockstepPassing`], [`SetClientId`], [`Disconnect`]).
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the peer
//! (lockstep state and handlers). It knows nothing about sockets or turns.
//!
//! ```text
//! Transport (bytes) → Protocol (frames, messages) → Peer (registry, lockstep)
//! ```

mod builtin;
mod cursor;
mod error;
mod frame;
mod message;

pub use builtin::{Disconnect, LockstepPassing, SetClientId};
pub use cursor::{NetworkReader, NetworkWriter, WireScalar};
pub use error::ProtocolError;
pub use frame::{split_frame, write_packet, FrameStatus, PacketHeader, HEADER_LEN};
pub use message::{AnyMessage, NetworkMessage, SendMode, WireTypeId};
