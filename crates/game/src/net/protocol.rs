use bitflags::bitflags;

use crate::error::TransportError;
use crate::packet::{PacketReader, PacketWriter};

pub const MAX_PACKET_SIZE: usize = 1200;
pub const PROTOCOL_VERSION: u8 = 1;
pub const PROTOCOL_MAGIC: u32 = 0x5245_4C4D;
pub const DEFAULT_PORT: u16 = 27015;
pub const DEFAULT_TICK_RATE: u32 = 30;

// magic + version + flags + sequence + ack + ack bitfield
pub const FRAME_HEADER_SIZE: usize = 4 + 1 + 1 + 4 + 4 + 4;
const RELIABLE_ID_SIZE: usize = 4;
/// Largest game payload that fits in one frame on either channel.
pub const MAX_PAYLOAD_SIZE: usize = MAX_PACKET_SIZE - FRAME_HEADER_SIZE - RELIABLE_ID_SIZE;

const SEQUENCE_WRAP_THRESHOLD: u32 = u32::MAX / 2;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FrameFlags: u8 {
        const RELIABLE = 1 << 0;
        const CONNECT = 1 << 1;
        const ACCEPT = 1 << 2;
        const DISCONNECT = 1 << 3;
    }
}

#[inline]
pub fn sequence_greater_than(s1: u32, s2: u32) -> bool {
    ((s1 > s2) && (s1 - s2 <= SEQUENCE_WRAP_THRESHOLD))
        || ((s1 < s2) && (s2 - s1 > SEQUENCE_WRAP_THRESHOLD))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub flags: FrameFlags,
    pub sequence: u32,
    pub ack: u32,
    pub ack_bitfield: u32,
}

impl FrameHeader {
    pub fn new(flags: FrameFlags, sequence: u32, ack: u32, ack_bitfield: u32) -> Self {
        Self {
            flags,
            sequence,
            ack,
            ack_bitfield,
        }
    }

    pub fn control(flags: FrameFlags) -> Self {
        Self::new(flags, 0, 0, 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub reliable_id: Option<u32>,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn control(flags: FrameFlags) -> Self {
        Self {
            header: FrameHeader::control(flags),
            reliable_id: None,
            payload: Vec::new(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, TransportError> {
        let mut pw = PacketWriter::new();
        pw.write_u32(PROTOCOL_MAGIC);
        pw.write_u8(PROTOCOL_VERSION);

        let mut flags = self.header.flags;
        flags.set(FrameFlags::RELIABLE, self.reliable_id.is_some());
        pw.write_u8(flags.bits());
        pw.write_u32(self.header.sequence);
        pw.write_u32(self.header.ack);
        pw.write_u32(self.header.ack_bitfield);
        if let Some(id) = self.reliable_id {
            pw.write_u32(id);
        }
        pw.write_bytes(&self.payload);

        if pw.len() > MAX_PACKET_SIZE {
            return Err(TransportError::FrameTooLarge(pw.len()));
        }
        Ok(pw.into_bytes())
    }

    pub fn decode(data: &[u8]) -> Result<Self, TransportError> {
        let mut reader = PacketReader::new(data);
        let short = |_| TransportError::Malformed("truncated header");

        if reader.read_u32().map_err(short)? != PROTOCOL_MAGIC {
            return Err(TransportError::Malformed("bad magic"));
        }
        if reader.read_u8().map_err(short)? != PROTOCOL_VERSION {
            return Err(TransportError::Malformed("unsupported version"));
        }
        let flags = FrameFlags::from_bits(reader.read_u8().map_err(short)?)
            .ok_or(TransportError::Malformed("unknown flags"))?;
        let sequence = reader.read_u32().map_err(short)?;
        let ack = reader.read_u32().map_err(short)?;
        let ack_bitfield = reader.read_u32().map_err(short)?;

        let reliable_id = if flags.contains(FrameFlags::RELIABLE) {
            Some(reader.read_u32().map_err(short)?)
        } else {
            None
        };

        Ok(Self {
            header: FrameHeader::new(flags, sequence, ack, ack_bitfield),
            reliable_id,
            payload: data[reader.offset()..].to_vec(),
        })
    }
}
