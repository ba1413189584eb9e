//! Message identity and the [`NetworkMessage`] trait.
//!
//! Every message type that travels between the two peers carries a
//! [`WireTypeId`]: a small integer both sides agree on *by construction*.
//! The id is an associated constant on the type, written by hand, so it is
//! stable across builds, platforms and languages.

use std::any::Any;
use std::fmt;

use crate::{NetworkReader, NetworkWriter, ProtocolError};

// ---------------------------------------------------------------------------
// WireTypeId
// ---------------------------------------------------------------------------

/// Integer tag identifying a message schema on the wire.
///
/// Negative ids are reserved for the framework's built-in messages
/// ([`LockstepPassing`](crate::LockstepPassing),
/// [`SetClientId`](crate::SetClientId), [`Disconnect`](crate::Disconnect)).
/// Applications should use ids `>= 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WireTypeId(pub i32);

impl WireTypeId {
    /// Returns `true` for ids in the reserved (built-in) range.
    pub fn is_reserved(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for WireTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SendMode
// ---------------------------------------------------------------------------

/// How a packet participates in lockstep arbitration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum SendMode {
    /// A state-changing update. Only the current lockstep owner may send it.
    #[default]
    Lockstep = 0,

    /// Not subject to lockstep arbitration; either peer may send it at
    /// any time (handshake, disconnect, cosmetic events).
    Extra = 1,
}

impl SendMode {
    /// The byte written in the packet header.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for SendMode {
    type Error = ProtocolError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0 => Ok(Self::Lockstep),
            1 => Ok(Self::Extra),
            other => Err(ProtocolError::InvalidMode(other)),
        }
    }
}

impl fmt::Display for SendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lockstep => write!(f, "Lockstep"),
            Self::Extra => write!(f, "Extra"),
        }
    }
}

// ---------------------------------------------------------------------------
// NetworkMessage
// ---------------------------------------------------------------------------

/// A value that can be sent to the other peer.
///
/// Implementations write their fields in a fixed order in
/// [`serialize`](Self::serialize) and read them back in the same order in
/// [`deserialize`](Self::deserialize). There is no self-description on the
/// wire beyond the packet header, so the two must mirror each other exactly.
///
/// ```rust
/// use salvo_protocol::{
///     NetworkMessage, NetworkReader, NetworkWriter, ProtocolError, WireTypeId,
/// };
///
/// #[derive(Debug, PartialEq)]
/// struct BombField { x: i32, y: i32 }
///
/// impl NetworkMessage for BombField {
///     const TYPE_ID: WireTypeId = WireTypeId(10);
///     const NAME: &'static str = "BombField";
///
///     fn serialize(&self, w: &mut NetworkWriter<'_>) -> Result<(), ProtocolError> {
///         w.write(self.x)?;
///         w.write(self.y)
///     }
///
///     fn deserialize(r: &mut NetworkReader<'_>) -> Result<Self, ProtocolError> {
///         Ok(Self { x: r.read()?, y: r.read()? })
///     }
/// }
/// ```
pub trait NetworkMessage: Send + 'static {
    /// The wire id. Must be identical on both peers and unique per registry.
    const TYPE_ID: WireTypeId;

    /// Human-readable name, used in logs and conflict errors.
    const NAME: &'static str;

    /// Writes the payload.
    fn serialize(&self, writer: &mut NetworkWriter<'_>) -> Result<(), ProtocolError>;

    /// Reads the payload.
    fn deserialize(reader: &mut NetworkReader<'_>) -> Result<Self, ProtocolError>
    where
        Self: Sized;
}

// ---------------------------------------------------------------------------
// AnyMessage
// ---------------------------------------------------------------------------

/// Object-safe counterpart of [`NetworkMessage`].
///
/// `NetworkMessage` has associated constants and a `Self`-returning
/// constructor, so it can't be used as `dyn NetworkMessage`. Every
/// `NetworkMessage` gets this trait for free via a blanket impl, which lets
/// the registry and the outbox hold messages of different types side by side.
pub trait AnyMessage: Send + 'static {
    /// The message's wire id.
    fn wire_id(&self) -> WireTypeId;

    /// The message's name.
    fn message_name(&self) -> &'static str;

    /// Writes the payload.
    fn serialize_dyn(&self, writer: &mut NetworkWriter<'_>) -> Result<(), ProtocolError>;

    /// Converts into `Box<dyn Any>` so the concrete type can be recovered.
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<M: NetworkMessage> AnyMessage for M {
    fn wire_id(&self) -> WireTypeId {
        M::TYPE_ID
    }

    fn message_name(&self) -> &'static str {
        M::NAME
    }

    fn serialize_dyn(&self, writer: &mut NetworkWriter<'_>) -> Result<(), ProtocolError> {
        self.serialize(writer)
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}
