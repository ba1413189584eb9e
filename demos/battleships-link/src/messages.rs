//! Game messages. Both builds of the demo must agree on every id and field
//! order here.

use salvo::prelude::*;

/// The orientation of a ship on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    Horizontal,
    Vertical,
}

impl Facing {
    fn to_byte(self) -> u8 {
        match self {
            Self::Horizontal => 0,
            Self::Vertical => 1,
        }
    }

    fn from_byte(b: u8) -> Result<Self, ProtocolError> {
        match b {
            0 => Ok(Self::Horizontal),
            1 => Ok(Self::Vertical),
            other => Err(ProtocolError::InvalidMessage(format!(
                "invalid ship facing {other}"
            ))),
        }
    }
}

/// Bomber → defender: fire at a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BombField {
    pub x: i32,
    pub y: i32,
}

impl NetworkMessage for BombField {
    const TYPE_ID: WireTypeId = WireTypeId(1);
    const NAME: &'static str = "BombField";

    fn serialize(&self, w: &mut NetworkWriter<'_>) -> Result<(), ProtocolError> {
        w.write(self.x)?;
        w.write(self.y)
    }

    fn deserialize(r: &mut NetworkReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            x: r.read()?,
            y: r.read()?,
        })
    }
}

/// Defender → bomber: what the shot at `(x, y)` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BombingResult {
    pub hit: bool,
    pub x: i32,
    pub y: i32,
}

impl NetworkMessage for BombingResult {
    const TYPE_ID: WireTypeId = WireTypeId(2);
    const NAME: &'static str = "BombingResult";

    fn serialize(&self, w: &mut NetworkWriter<'_>) -> Result<(), ProtocolError> {
        w.write(self.hit)?;
        w.write(self.x)?;
        w.write(self.y)
    }

    fn deserialize(r: &mut NetworkReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            hit: r.read()?,
            x: r.read()?,
            y: r.read()?,
        })
    }
}

/// Server → client: who bombs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetBomber {
    pub id: i32,
}

impl NetworkMessage for SetBomber {
    const TYPE_ID: WireTypeId = WireTypeId(3);
    const NAME: &'static str = "SetBomber";

    fn serialize(&self, w: &mut NetworkWriter<'_>) -> Result<(), ProtocolError> {
        w.write(self.id)
    }

    fn deserialize(r: &mut NetworkReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self { id: r.read()? })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameOver {
    pub winner: i32,
}

impl NetworkMessage for GameOver {
    const TYPE_ID: WireTypeId = WireTypeId(4);
    const NAME: &'static str = "GameOver";

    fn serialize(&self, w: &mut NetworkWriter<'_>) -> Result<(), ProtocolError> {
        w.write(self.winner)
    }

    fn deserialize(r: &mut NetworkReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self { winner: r.read()? })
    }
}

/// Server → client: both fleets are placed, bombing begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GameStarting;

impl NetworkMessage for GameStarting {
    const TYPE_ID: WireTypeId = WireTypeId(5);
    const NAME: &'static str = "GameStarting";

    fn serialize(&self, _w: &mut NetworkWriter<'_>) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn deserialize(_r: &mut NetworkReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self)
    }
}

/// Sent by the player whose last ship just sank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldCleared {
    pub id: i32,
}

impl NetworkMessage for FieldCleared {
    const TYPE_ID: WireTypeId = WireTypeId(6);
    const NAME: &'static str = "FieldCleared";

    fn serialize(&self, w: &mut NetworkWriter<'_>) -> Result<(), ProtocolError> {
        w.write(self.id)
    }

    fn deserialize(r: &mut NetworkReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self { id: r.read()? })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinishedBuilding {
    pub id: i32,
}

impl NetworkMessage for FinishedBuilding {
    const TYPE_ID: WireTypeId = WireTypeId(7);
    const NAME: &'static str = "FinishedBuilding";

    fn serialize(&self, w: &mut NetworkWriter<'_>) -> Result<(), ProtocolError> {
        w.write(self.id)
    }

    fn deserialize(r: &mut NetworkReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self { id: r.read()? })
    }
}

/// Defender → bomber: the ship at `(x, y)` went down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShipSunk {
    pub x: i32,
    pub y: i32,
    pub length: i32,
    pub facing: Facing,
}

impl NetworkMessage for ShipSunk {
    const TYPE_ID: WireTypeId = WireTypeId(8);
    const NAME: &'static str = "ShipSunk";

    fn serialize(&self, w: &mut NetworkWriter<'_>) -> Result<(), ProtocolError> {
        w.write(self.x)?;
        w.write(self.y)?;
        w.write(self.length)?;
        w.write(self.facing.to_byte())
    }

    fn deserialize(r: &mut NetworkReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            x: r.read()?,
            y: r.read()?,
            length: r.read()?,
            facing: Facing::from_byte(r.read()?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ship_sunk_rejects_unknown_facing() {
        let mut buf = [0u8; 13];
        buf[12] = 7;
        let mut r = NetworkReader::new(&buf);
        assert!(matches!(
            ShipSunk::deserialize(&mut r),
            Err(ProtocolError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_bombing_result_layout() {
        let mut buf = [0u8; 16];
        let mut w = NetworkWriter::new(&mut buf);
        BombingResult { hit: true, x: 3, y: -1 }.serialize(&mut w).unwrap();
        assert_eq!(w.as_written(), &[1, 3, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF]);
    }
}
