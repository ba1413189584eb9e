//! Error types for the protocol layer.
//!
//! Each crate in Salvo defines its own error enum. A `ProtocolError` always
//! means the bytes themselves were wrong (or the registry was configured
//! wrong), never that a socket failed.

use crate::WireTypeId;

/// Errors that can occur while encoding, decoding or framing messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The writer ran out of room.
    ///
    /// The transmit buffer has a fixed capacity; a message that does not
    /// fit is rejected instead of being truncated.
    #[error("buffer overflow: needed {needed} bytes, {available} available")]
    BufferOverflow { needed: usize, available: usize },

    /// The reader hit the end of its buffer before the schema was satisfied.
    #[error("unexpected end of buffer: needed {needed} bytes, {available} available")]
    UnexpectedEof { needed: usize, available: usize },

    /// A length prefix was negative or otherwise unusable.
    #[error("invalid length prefix: {0}")]
    InvalidLength(i64),

    /// A string field did not contain valid UTF-8.
    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    /// A `bool` field held something other than 0 or 1.
    #[error("invalid bool byte: {0:#04x}")]
    InvalidBool(u8),

    /// The packet header carried an unknown send mode.
    #[error("invalid send mode byte: {0:#04x}")]
    InvalidMode(u8),

    /// A frame announced a payload larger than the receive buffer can hold.
    #[error("frame payload of {len} bytes exceeds capacity of {capacity}")]
    FrameTooLarge { len: usize, capacity: usize },

    /// Deserialization finished but left bytes of the payload unread.
    ///
    /// Both peers must agree on every schema byte-for-byte; leftover bytes
    /// mean they don't.
    #[error("message {id} left {remaining} payload bytes unread")]
    TrailingBytes { id: WireTypeId, remaining: usize },

    /// No message type is registered under this id.
    #[error("unknown message type {0}")]
    UnknownType(WireTypeId),

    /// Two message types were registered under the same wire id.
    ///
    /// This is a startup configuration error. The registry never silently
    /// overwrites an existing entry.
    #[error("wire id {id} is already registered to {existing}, cannot register {new}")]
    RegistrationConflict {
        id: WireTypeId,
        existing: &'static str,
        new: &'static str,
    },

    /// The stream can no longer be parsed; everything buffered was dropped.
    #[error("protocol desync: {0}")]
    Desync(String),

    /// The message decoded but violates protocol rules.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
