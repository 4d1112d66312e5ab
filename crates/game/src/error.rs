use crate::entity::MapEntityIndex;
use crate::world::{MapId, UserId};

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("packet ended after {offset} bytes, needed {needed} more")]
    UnexpectedEnd { offset: usize, needed: usize },
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),
    #[error("string of {len} bytes exceeds the limit of {max}")]
    StringTooLong { len: usize, max: usize },
    #[error("string is not valid utf-8")]
    InvalidUtf8,
    #[error("empty packet")]
    Empty,
}

#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("map {0} does not exist")]
    UnknownMap(MapId),
    #[error("map {0} already exists")]
    DuplicateMap(MapId),
    #[error("map {0} is disposed")]
    MapDisposed(MapId),
    #[error("user {0} is not online")]
    UnknownUser(UserId),
    #[error("account `{0}` already has a user online")]
    AccountInUse(String),
    #[error("`{0}` is not a valid account name")]
    InvalidAccount(String),
    #[error("map {0} has no free entity index")]
    MapFull(MapId),
    #[error("no entity at index {index} on map {map}")]
    UnknownEntity { map: MapId, index: MapEntityIndex },
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("connection is closed")]
    NotConnected,
    #[error("server is full")]
    ServerFull,
    #[error("frame of {0} bytes exceeds the MTU")]
    FrameTooLarge(usize),
    #[error("malformed frame: {0}")]
    Malformed(&'static str),
}
