//! Packet framing.
//!
//! Every packet on the stream is laid out as:
//!
//! ```text
//! ┌──────────┬───────────────┬───────────────────┬─────────────────────┐
//! │ mode: u8 │ type_id: i32  │ payload_len: u32  │ payload             │
//! │          │ little-endian │ little-endian     │ (payload_len bytes) │
//! └──────────┴───────────────┴───────────────────┴─────────────────────┘
//! ```
//!
//! The payload itself is schema-defined (see
//! [`NetworkMessage`](crate::NetworkMessage)). The explicit `payload_len`
//! lets a receiver skip a message it doesn't know and lets it tell a
//! complete frame from one that is still arriving.

use crate::{AnyMessage, NetworkReader, NetworkWriter, ProtocolError, SendMode, WireTypeId};

/// Size of the fixed packet header in bytes.
pub const HEADER_LEN: usize = 1 + 4 + 4;

// ---------------------------------------------------------------------------
// PacketHeader
// ---------------------------------------------------------------------------

/// The fixed-size part of every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Whether this packet was subject to lockstep arbitration.
    pub mode: SendMode,
    /// Which schema the payload follows.
    pub type_id: WireTypeId,
    /// Number of payload bytes following the header.
    pub payload_len: u32,
}

impl PacketHeader {
    /// Reads a header from the reader.
    pub fn decode(reader: &mut NetworkReader<'_>) -> Result<Self, ProtocolError> {
        let mode = SendMode::try_from(reader.read::<u8>()?)?;
        let type_id = WireTypeId(reader.read::<i32>()?);
        let payload_len = reader.read::<u32>()?;
        Ok(Self {
            mode,
            type_id,
            payload_len,
        })
    }

    /// Writes the header.
    pub fn encode(&self, writer: &mut NetworkWriter<'_>) -> Result<(), ProtocolError> {
        writer.write(self.mode.as_byte())?;
        writer.write(self.type_id.0)?;
        writer.write(self.payload_len)
    }

    /// Total frame size (header plus payload).
    pub fn frame_len(&self) -> usize {
        HEADER_LEN + self.payload_len as usize
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Writes one complete frame and returns the number of bytes it took.
///
/// The payload is serialized only if `message` is `Some`; otherwise the
/// frame is header-only with a zero length. The length field is
/// back-patched once the payload is written.
pub fn write_packet(
    writer: &mut NetworkWriter<'_>,
    mode: SendMode,
    type_id: WireTypeId,
    message: Option<&dyn AnyMessage>,
) -> Result<usize, ProtocolError> {
    let start = writer.position();
    let header = PacketHeader {
        mode,
        type_id,
        payload_len: 0,
    };
    header.encode(writer)?;

    let payload_start = writer.position();
    if let Some(message) = message {
        message.serialize_dyn(writer)?;
    }
    let payload_len = writer.position() - payload_start;
    let payload_len = u32::try_from(payload_len)
        .map_err(|_| ProtocolError::InvalidLength(payload_len as i64))?;
    writer.write_at(payload_start - 4, payload_len)?;

    Ok(writer.position() - start)
}

// ---------------------------------------------------------------------------
// Splitting a byte stream into frames
// ---------------------------------------------------------------------------

/// Result of looking for a frame at the front of a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameStatus<'a> {
    /// A whole frame is available.
    Complete {
        header: PacketHeader,
        payload: &'a [u8],
        /// Bytes to drop from the front of the buffer to get past this frame.
        consumed: usize,
    },

    /// Not enough bytes yet; wait for more data.
    Incomplete,
}

/// Looks for one frame at the start of `buf`.
///
/// `max_payload` bounds the announced payload length: a frame that could
/// never fit in the receive buffer is an error rather than
/// [`FrameStatus::Incomplete`], otherwise the reader would wait forever.
pub fn split_frame(buf: &[u8], max_payload: usize) -> Result<FrameStatus<'_>, ProtocolError> {
    if buf.len() < HEADER_LEN {
        return Ok(FrameStatus::Incomplete);
    }

    let mut reader = NetworkReader::new(buf);
    let header = PacketHeader::decode(&mut reader)?;

    let len = header.payload_len as usize;
    if len > max_payload {
        return Err(ProtocolError::FrameTooLarge {
            len,
            capacity: max_payload,
        });
    }
    if reader.remaining() < len {
        return Ok(FrameStatus::Incomplete);
    }

    let payload = reader.read_bytes(len)?;
    Ok(FrameStatus::Complete {
        header,
        payload,
        consumed: header.frame_len(),
    })
}
