//! Messages the framework itself exchanges.
//!
//! These occupy the reserved (negative) id range. Every peer registers them
//! before any application message, so they're always understood.

use crate::{NetworkMessage, NetworkReader, NetworkWriter, ProtocolError, WireTypeId};

/// Hands lockstep ownership to the receiver. Empty payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LockstepPassing;

impl NetworkMessage for LockstepPassing {
    const TYPE_ID: WireTypeId = WireTypeId(-1);
    const NAME: &'static str = "LockstepPassing";

    fn serialize(&self, _writer: &mut NetworkWriter<'_>) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn deserialize(_reader: &mut NetworkReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self)
    }
}

/// Server → client: "this is your peer id".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SetClientId {
    pub id: i32,
}

impl NetworkMessage for SetClientId {
    const TYPE_ID: WireTypeId = WireTypeId(-2);
    const NAME: &'static str = "SetClientId";

    fn serialize(&self, writer: &mut NetworkWriter<'_>) -> Result<(), ProtocolError> {
        writer.write(self.id)
    }

    fn deserialize(reader: &mut NetworkReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self { id: reader.read()? })
    }
}

/// Sent by a peer that is shutting down, so the other side stops waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Disconnect;

impl NetworkMessage for Disconnect {
    const TYPE_ID: WireTypeId = WireTypeId(-3);
    const NAME: &'static str = "Disconnect";

    fn serialize(&self, _writer: &mut NetworkWriter<'_>) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn deserialize(_reader: &mut NetworkReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_ids_are_reserved_and_distinct() {
        let ids = [
            LockstepPassing::TYPE_ID,
            SetClientId::TYPE_ID,
            Disconnect::TYPE_ID,
        ];
        assert!(ids.iter().all(|id| id.is_reserved()));
        assert_ne!(ids[0], ids[1]);
        assert_ne!(ids[1], ids[2]);
        assert_ne!(ids[0], ids[2]);
    }

    #[test]
    fn test_empty_messages_write_nothing() {
        let mut buf = [0u8; 4];
        let mut w = NetworkWriter::new(&mut buf);
        LockstepPassing.serialize(&mut w).unwrap();
        Disconnect.serialize(&mut w).unwrap();
        assert_eq!(w.written(), 0);
    }

    #[test]
    fn test_set_client_id_payload() {
        let mut buf = [0u8; 4];
        let mut w = NetworkWriter::new(&mut buf);
        SetClientId { id: 1 }.serialize(&mut w).unwrap();
        assert_eq!(buf, [1, 0, 0, 0]);

        let mut r = NetworkReader::new(&buf);
        assert_eq!(SetClientId::deserialize(&mut r).unwrap(), SetClientId { id: 1 });
        assert!(r.is_exhausted());
    }
}
