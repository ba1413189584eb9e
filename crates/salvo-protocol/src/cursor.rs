//! Bounds-checked binary cursors over a byte buffer.
//!
//! [`NetworkWriter`] appends fixed-layout values to a fixed-capacity buffer,
//! [`NetworkReader`] consumes them again in the same order. Neither side
//! carries type information: the producer and the consumer must agree on
//! the schema, field by field.
//!
//! ## Encoding
//!
//! Every scalar is written in **little-endian** byte order, whatever the
//! host's native order is, so two independent builds always produce
//! bit-identical bytes.
//!
//! | Type | Bytes |
//! |---|---|
//! | `u8`, `i8`, `bool` | 1 |
//! | `u16`, `i16` | 2 |
//! | `u32`, `i32`, `f32` | 4 |
//! | `u64`, `i64`, `f64` | 8 |
//! | string | 4 (`i32` length) + UTF-8 bytes |
//!
//! A `bool` is `0` or `1`; any other byte fails to decode.

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// WireScalar
// ---------------------------------------------------------------------------

mod sealed {
    pub trait Sealed {}
}

/// A fixed-size value that can be written to and read from the wire.
///
/// This trait is sealed: the set of wire scalars is part of the protocol,
/// so downstream crates compose messages out of these rather than adding
/// their own encodings.
pub trait WireScalar: Copy + sealed::Sealed {
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Writes `self` into `out`, which is exactly [`Self::SIZE`] bytes long.
    fn encode_le(self, out: &mut [u8]);

    /// Reads a value from `bytes`, which is exactly [`Self::SIZE`] bytes long.
    fn decode_le(bytes: &[u8]) -> Result<Self, ProtocolError>;
}

macro_rules! impl_wire_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl WireScalar for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn encode_le(self, out: &mut [u8]) {
                    out.copy_from_slice(&self.to_le_bytes());
                }

                fn decode_le(bytes: &[u8]) -> Result<Self, ProtocolError> {
                    let raw = bytes.try_into().map_err(|_| {
                        ProtocolError::UnexpectedEof {
                            needed: Self::SIZE,
                            available: bytes.len(),
                        }
                    })?;
                    Ok(<$ty>::from_le_bytes(raw))
                }
            }
        )*
    };
}

impl_wire_scalar!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl sealed::Sealed for bool {}

impl WireScalar for bool {
    const SIZE: usize = 1;

    fn encode_le(self, out: &mut [u8]) {
        out[0] = u8::from(self);
    }

    fn decode_le(bytes: &[u8]) -> Result<Self, ProtocolError> {
        match bytes {
            [0] => Ok(false),
            [1] => Ok(true),
            [other] => Err(ProtocolError::InvalidBool(*other)),
            _ => Err(ProtocolError::UnexpectedEof {
                needed: 1,
                available: bytes.len(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// NetworkWriter
// ---------------------------------------------------------------------------

/// Appends wire values to a borrowed, fixed-capacity buffer.
///
/// The writer never grows the buffer. A write that does not fit fails with
/// [`ProtocolError::BufferOverflow`] and leaves the cursor where it was.
///
/// ```rust
/// use salvo_protocol::NetworkWriter;
///
/// let mut buf = [0u8; 16];
/// let mut writer = NetworkWriter::new(&mut buf);
/// writer.write(7i32).unwrap();
/// writer.write(true).unwrap();
/// assert_eq!(writer.as_written(), &[7, 0, 0, 0, 1]);
/// ```
#[derive(Debug)]
pub struct NetworkWriter<'a> {
    buffer: &'a mut [u8],
    position: usize,
}

impl<'a> NetworkWriter<'a> {
    /// Creates a writer positioned at the start of `buffer`.
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Current cursor position, which is also the number of bytes written.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of bytes written so far.
    pub fn written(&self) -> usize {
        self.position
    }

    /// Total capacity of the underlying buffer.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes still available for writing.
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    /// The bytes written so far.
    pub fn as_written(&self) -> &[u8] {
        &self.buffer[..self.position]
    }

    /// Reserves `len` bytes at the cursor and advances past them.
    fn advance(&mut self, len: usize) -> Result<&mut [u8], ProtocolError> {
        if len > self.remaining() {
            return Err(ProtocolError::BufferOverflow {
                needed: len,
                available: self.remaining(),
            });
        }
        let start = self.position;
        self.position += len;
        Ok(&mut self.buffer[start..self.position])
    }

    /// Writes one scalar value.
    pub fn write<T: WireScalar>(&mut self, value: T) -> Result<(), ProtocolError> {
        let slot = self.advance(T::SIZE)?;
        value.encode_le(slot);
        Ok(())
    }

    /// Overwrites a scalar at an absolute offset that was already written.
    ///
    /// Used to back-patch length fields once the data they describe has
    /// been serialized. The cursor does not move.
    pub fn write_at<T: WireScalar>(
        &mut self,
        offset: usize,
        value: T,
    ) -> Result<(), ProtocolError> {
        let end = offset.checked_add(T::SIZE).unwrap_or(usize::MAX);
        if end > self.position {
            return Err(ProtocolError::BufferOverflow {
                needed: end,
                available: self.position,
            });
        }
        value.encode_le(&mut self.buffer[offset..end]);
        Ok(())
    }

    /// Appends raw bytes without any length prefix.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        let slot = self.advance(bytes.len())?;
        slot.copy_from_slice(bytes);
        Ok(())
    }

    /// Writes an `i32` byte-length prefix followed by the UTF-8 bytes.
    ///
    /// The whole string is checked against the remaining capacity before
    /// anything is written, so a failed call leaves no partial prefix.
    pub fn write_string(&mut self, value: &str) -> Result<(), ProtocolError> {
        let len = i32::try_from(value.len())
            .map_err(|_| ProtocolError::InvalidLength(value.len() as i64))?;
        let needed = i32::SIZE + value.len();
        if needed > self.remaining() {
            return Err(ProtocolError::BufferOverflow {
                needed,
                available: self.remaining(),
            });
        }
        self.write(len)?;
        self.write_bytes(value.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// NetworkReader
// ---------------------------------------------------------------------------

/// Consumes wire values from a borrowed buffer, front to back.
///
/// ```rust
/// use salvo_protocol::NetworkReader;
///
/// let bytes = [7, 0, 0, 0, 1];
/// let mut reader = NetworkReader::new(&bytes);
/// assert_eq!(reader.read::<i32>().unwrap(), 7);
/// assert!(reader.read::<bool>().unwrap());
/// assert_eq!(reader.remaining(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct NetworkReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> NetworkReader<'a> {
    /// Creates a reader positioned at the start of `buffer`.
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Current cursor position (bytes consumed so far).
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    /// Returns `true` when every byte has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        if len > self.remaining() {
            return Err(ProtocolError::UnexpectedEof {
                needed: len,
                available: self.remaining(),
            });
        }
        let start = self.position;
        self.position += len;
        Ok(&self.buffer[start..self.position])
    }

    /// Reads one scalar value.
    pub fn read<T: WireScalar>(&mut self) -> Result<T, ProtocolError> {
        let bytes = self.take(T::SIZE)?;
        T::decode_le(bytes)
    }

    /// Reads exactly `count` raw bytes, borrowed from the buffer.
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], ProtocolError> {
        self.take(count)
    }

    /// Reads an `i32` length prefix and that many UTF-8 bytes.
    pub fn read_string(&mut self) -> Result<String, ProtocolError> {
        let len = self.read::<i32>()?;
        let len = usize::try_from(len)
            .map_err(|_| ProtocolError::InvalidLength(i64::from(len)))?;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| ProtocolError::InvalidUtf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars_are_little_endian() {
        let mut buf = [0u8; 32];
        let mut w = NetworkWriter::new(&mut buf);
        w.write(0x0102_0304i32).unwrap();
        w.write(0xAABBu16).unwrap();
        w.write(-1i8).unwrap();
        w.write(1.0f32).unwrap();

        assert_eq!(
            w.as_written(),
            &[0x04, 0x03, 0x02, 0x01, 0xBB, 0xAA, 0xFF, 0x00, 0x00, 0x80, 0x3F]
        );
    }

    #[test]
    fn test_mixed_fields_read_back_in_order() {
        let mut buf = [0u8; 64];
        let mut w = NetworkWriter::new(&mut buf);
        w.write(42u64).unwrap();
        w.write_string("Hi, Ålesund").unwrap();
        w.write(false).unwrap();
        w.write(-3.5f64).unwrap();
        w.write_bytes(&[9, 8, 7]).unwrap();
        let written = w.written();

        let mut r = NetworkReader::new(&buf[..written]);
        assert_eq!(r.read::<u64>().unwrap(), 42);
        assert_eq!(r.read_string().unwrap(), "Hi, Ålesund");
        assert!(!r.read::<bool>().unwrap());
        assert_eq!(r.read::<f64>().unwrap(), -3.5);
        assert_eq!(r.read_bytes(3).unwrap(), &[9, 8, 7]);
        assert!(r.is_exhausted());
    }

    #[test]
    fn test_string_prefix_counts_bytes_not_chars() {
        let mut buf = [0u8; 16];
        let mut w = NetworkWriter::new(&mut buf);
        w.write_string("é").unwrap();
        assert_eq!(w.as_written(), &[2, 0, 0, 0, 0xC3, 0xA9]);
    }

    #[test]
    fn test_write_overflow_leaves_cursor_unchanged() {
        let mut buf = [0u8; 3];
        let mut w = NetworkWriter::new(&mut buf);
        w.write(1u16).unwrap();

        let err = w.write(1u32).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::BufferOverflow {
                needed: 4,
                available: 1
            }
        );
        assert_eq!(w.position(), 2);
    }

    #[test]
    fn test_write_string_that_does_not_fit_writes_nothing() {
        let mut buf = [0u8; 6];
        let mut w = NetworkWriter::new(&mut buf);
        assert!(w.write_string("hello").is_err());
        assert_eq!(w.position(), 0);
    }

    #[test]
    fn test_write_at_patches_without_moving_cursor() {
        let mut buf = [0u8; 8];
        let mut w = NetworkWriter::new(&mut buf);
        w.write(0u32).unwrap();
        w.write(5u8).unwrap();
        w.write_at(0, 0xFFu32).unwrap();

        assert_eq!(w.position(), 5);
        assert_eq!(w.as_written(), &[0xFF, 0, 0, 0, 5]);
    }

    #[test]
    fn test_write_at_rejects_unwritten_region() {
        let mut buf = [0u8; 8];
        let mut w = NetworkWriter::new(&mut buf);
        w.write(1u8).unwrap();
        assert!(w.write_at(0, 1u32).is_err());
    }

    #[test]
    fn test_read_past_end_is_an_error() {
        let bytes = [1, 2];
        let mut r = NetworkReader::new(&bytes);
        let err = r.read::<i32>().unwrap_err();
        assert_eq!(
            err,
            ProtocolError::UnexpectedEof {
                needed: 4,
                available: 2
            }
        );
        // A failed read does not consume anything.
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn test_negative_string_length_is_rejected() {
        let bytes = (-1i32).to_le_bytes();
        let mut r = NetworkReader::new(&bytes);
        assert_eq!(r.read_string().unwrap_err(), ProtocolError::InvalidLength(-1));
    }

    #[test]
    fn test_truncated_string_is_rejected() {
        let mut bytes = 10i32.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"abc");
        let mut r = NetworkReader::new(&bytes);
        assert!(matches!(
            r.read_string(),
            Err(ProtocolError::UnexpectedEof { needed: 10, available: 3 })
        ));
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        let mut bytes = 2i32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0xFF, 0xFE]);
        let mut r = NetworkReader::new(&bytes);
        assert_eq!(r.read_string().unwrap_err(), ProtocolError::InvalidUtf8);
    }

    #[test]
    fn test_bool_only_accepts_zero_or_one() {
        let mut r = NetworkReader::new(&[2]);
        assert_eq!(r.read::<bool>().unwrap_err(), ProtocolError::InvalidBool(2));
    }
}
