use glam::Vec2;

use crate::entity::MapEntityIndex;
use crate::error::PacketError;

use super::{MAX_NAME_LENGTH, MAX_SAY_LENGTH, PacketReader, PacketWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ClientPacketId {
    Login = 1,
    Move = 2,
    Say = 3,
    Attack = 4,
    StartShopping = 5,
    BuyFromShop = 6,
    Disconnect = 7,
    UseItem = 8,
}

impl TryFrom<u8> for ClientPacketId {
    type Error = PacketError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let id = match value {
            1 => Self::Login,
            2 => Self::Move,
            3 => Self::Say,
            4 => Self::Attack,
            5 => Self::StartShopping,
            6 => Self::BuyFromShop,
            7 => Self::Disconnect,
            8 => Self::UseItem,
            other => return Err(PacketError::UnknownOpcode(other)),
        };
        Ok(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MoveDirection {
    Stop = 0,
    Left = 1,
    Right = 2,
    Up = 3,
    Down = 4,
}

impl MoveDirection {
    fn from_u8(value: u8) -> Option<Self> {
        let dir = match value {
            0 => Self::Stop,
            1 => Self::Left,
            2 => Self::Right,
            3 => Self::Up,
            4 => Self::Down,
            _ => return None,
        };
        Some(dir)
    }

    /// Unit direction in screen space (y grows downwards).
    pub fn vector(self) -> Vec2 {
        match self {
            Self::Stop => Vec2::ZERO,
            Self::Left => Vec2::NEG_X,
            Self::Right => Vec2::X,
            Self::Up => Vec2::NEG_Y,
            Self::Down => Vec2::Y,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientPacket {
    Login { name: String },
    Move { direction: MoveDirection },
    Say { text: String },
    Attack { target: MapEntityIndex },
    StartShopping { shopkeeper: MapEntityIndex },
    BuyFromShop { slot: u8, amount: u8 },
    Disconnect,
    UseItem { slot: u8 },
}

impl ClientPacket {
    pub fn id(&self) -> ClientPacketId {
        match self {
            Self::Login { .. } => ClientPacketId::Login,
            Self::Move { .. } => ClientPacketId::Move,
            Self::Say { .. } => ClientPacketId::Say,
            Self::Attack { .. } => ClientPacketId::Attack,
            Self::StartShopping { .. } => ClientPacketId::StartShopping,
            Self::BuyFromShop { .. } => ClientPacketId::BuyFromShop,
            Self::Disconnect => ClientPacketId::Disconnect,
            Self::UseItem { .. } => ClientPacketId::UseItem,
        }
    }

    pub fn encode(&self) -> PacketWriter {
        let mut pw = PacketWriter::with_opcode(self.id() as u8);
        match self {
            Self::Login { name } => pw.write_string(name, MAX_NAME_LENGTH),
            Self::Move { direction } => pw.write_u8(*direction as u8),
            Self::Say { text } => pw.write_string(text, MAX_SAY_LENGTH),
            Self::Attack { target } => pw.write_u16(target.get()),
            Self::StartShopping { shopkeeper } => pw.write_u16(shopkeeper.get()),
            Self::BuyFromShop { slot, amount } => {
                pw.write_u8(*slot);
                pw.write_u8(*amount);
            }
            Self::Disconnect => {}
            Self::UseItem { slot } => pw.write_u8(*slot),
        }
        pw
    }

    pub fn decode(reader: &mut PacketReader<'_>) -> Result<Self, PacketError> {
        let id = ClientPacketId::try_from(reader.read_u8()?)?;
        let packet = match id {
            ClientPacketId::Login => Self::Login {
                name: reader.read_string(MAX_NAME_LENGTH)?,
            },
            ClientPacketId::Move => {
                let raw = reader.read_u8()?;
                // Unknown directions stop the character.
                let direction = MoveDirection::from_u8(raw).unwrap_or(MoveDirection::Stop);
                Self::Move { direction }
            }
            ClientPacketId::Say => Self::Say {
                text: reader.read_string(MAX_SAY_LENGTH)?,
            },
            ClientPacketId::Attack => Self::Attack {
                target: MapEntityIndex(reader.read_u16()?),
            },
            ClientPacketId::StartShopping => Self::StartShopping {
                shopkeeper: MapEntityIndex(reader.read_u16()?),
            },
            ClientPacketId::BuyFromShop => Self::BuyFromShop {
                slot: reader.read_u8()?,
                amount: reader.read_u8()?,
            },
            ClientPacketId::Disconnect => Self::Disconnect,
            ClientPacketId::UseItem => Self::UseItem {
                slot: reader.read_u8()?,
            },
        };
        Ok(packet)
    }

    pub fn decode_all(data: &[u8]) -> Result<Vec<Self>, PacketError> {
        if data.is_empty() {
            return Err(PacketError::Empty);
        }
        let mut reader = PacketReader::new(data);
        let mut packets = Vec::new();
        while reader.remaining() > 0 {
            packets.push(Self::decode(&mut reader)?);
        }
        Ok(packets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_concatenated_messages() {
        let mut pw = ClientPacket::Move {
            direction: MoveDirection::Left,
        }
        .encode();
        pw.write_bytes(
            ClientPacket::BuyFromShop { slot: 2, amount: 5 }
                .encode()
                .as_bytes(),
        );
        pw.write_bytes(ClientPacket::UseItem { slot: 4 }.encode().as_bytes());

        let packets = ClientPacket::decode_all(pw.as_bytes()).unwrap();
        assert_eq!(
            packets,
            vec![
                ClientPacket::Move {
                    direction: MoveDirection::Left
                },
                ClientPacket::BuyFromShop { slot: 2, amount: 5 },
                ClientPacket::UseItem { slot: 4 },
            ]
        );
    }

    #[test]
    fn login_name_over_limit_is_rejected() {
        let mut pw = PacketWriter::with_opcode(ClientPacketId::Login as u8);
        pw.write_string(&"x".repeat(MAX_NAME_LENGTH + 5), usize::MAX);
        assert!(matches!(
            ClientPacket::decode_all(pw.as_bytes()),
            Err(PacketError::StringTooLong { .. })
        ));
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(matches!(
            ClientPacket::decode_all(&[0xEE]),
            Err(PacketError::UnknownOpcode(0xEE))
        ));
        assert!(matches!(ClientPacket::decode_all(&[]), Err(PacketError::Empty)));
        assert!(ClientPacket::decode_all(&[ClientPacketId::Attack as u8, 0]).is_err());
    }
}
