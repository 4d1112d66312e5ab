//! Wire encoding: one leading opcode byte, then a fixed sequence of
//! big-endian fields. Strings carry a u16 length prefix and are capped.

mod client;
mod message;
mod reader;
pub mod server;
mod writer;

pub use client::{ClientPacket, ClientPacketId, MoveDirection};
pub use message::GameMessage;
pub use reader::PacketReader;
pub use server::ServerPacketId;
pub use writer::PacketWriter;

use crate::net::MAX_PAYLOAD_SIZE;

pub const MAX_NAME_LENGTH: usize = 30;
pub const MAX_SAY_LENGTH: usize = 250;
pub const MAX_SHOP_NAME_LENGTH: usize = 60;
pub const MAX_MESSAGE_PARAMETER_LENGTH: usize = MAX_SAY_LENGTH;
pub const MAX_MESSAGE_PARAMETERS: usize = 4;

// opcode + shopkeeper + name + entry count
const SHOP_HEADER_SIZE: usize = 1 + 2 + (2 + MAX_SHOP_NAME_LENGTH) + 1;
// present flag + template + name + graphic + value
const SHOP_ENTRY_SIZE: usize = 1 + 4 + (2 + MAX_NAME_LENGTH) + 2 + 4;
/// Most shop slots one `StartShopping` can list.
pub const MAX_SHOP_ITEMS: usize = (MAX_PAYLOAD_SIZE - SHOP_HEADER_SIZE) / SHOP_ENTRY_SIZE;

const _: () = assert!(SHOP_HEADER_SIZE + MAX_SHOP_ITEMS * SHOP_ENTRY_SIZE <= MAX_PAYLOAD_SIZE);
const _: () = assert!(
    1 + 2 + 1 + MAX_MESSAGE_PARAMETERS * (2 + MAX_MESSAGE_PARAMETER_LENGTH) <= MAX_PAYLOAD_SIZE
);
