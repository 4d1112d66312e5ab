use byteorder::{BigEndian, ByteOrder};
use glam::Vec2;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketWriter {
    bytes: Vec<u8>,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_opcode(opcode: u8) -> Self {
        let mut writer = Self {
            bytes: Vec::with_capacity(32),
        };
        writer.write_u8(opcode);
        writer
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn opcode(&self) -> Option<u8> {
        self.bytes.first().copied()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.bytes.push(u8::from(value));
    }

    pub fn write_u16(&mut self, value: u16) {
        let mut buf = [0u8; 2];
        BigEndian::write_u16(&mut buf, value);
        self.bytes.extend_from_slice(&buf);
    }

    pub fn write_i16(&mut self, value: i16) {
        let mut buf = [0u8; 2];
        BigEndian::write_i16(&mut buf, value);
        self.bytes.extend_from_slice(&buf);
    }

    pub fn write_u32(&mut self, value: u32) {
        let mut buf = [0u8; 4];
        BigEndian::write_u32(&mut buf, value);
        self.bytes.extend_from_slice(&buf);
    }

    pub fn write_i32(&mut self, value: i32) {
        let mut buf = [0u8; 4];
        BigEndian::write_i32(&mut buf, value);
        self.bytes.extend_from_slice(&buf);
    }

    pub fn write_f32(&mut self, value: f32) {
        let mut buf = [0u8; 4];
        BigEndian::write_f32(&mut buf, value);
        self.bytes.extend_from_slice(&buf);
    }

    pub fn write_vec2(&mut self, value: Vec2) {
        self.write_f32(value.x);
        self.write_f32(value.y);
    }

    /// Writes a u16 length prefix followed by at most `max_len` bytes of `value`.
    /// Truncation never splits a character.
    pub fn write_string(&mut self, value: &str, max_len: usize) {
        let max_len = max_len.min(u16::MAX as usize);
        let mut end = value.len().min(max_len);
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        self.write_u16(end as u16);
        self.bytes.extend_from_slice(&value.as_bytes()[..end]);
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }
}

impl AsRef<[u8]> for PacketWriter {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_big_endian() {
        let mut pw = PacketWriter::with_opcode(7);
        pw.write_u16(0x0102);
        pw.write_u32(0x0A0B0C0D);
        assert_eq!(pw.as_bytes(), &[7, 1, 2, 0x0A, 0x0B, 0x0C, 0x0D]);
    }

    #[test]
    fn string_is_capped() {
        let mut pw = PacketWriter::new();
        pw.write_string("hello world", 5);
        assert_eq!(pw.as_bytes(), &[0, 5, b'h', b'e', b'l', b'l', b'o']);
    }

    #[test]
    fn string_cap_respects_char_boundary() {
        let mut pw = PacketWriter::new();
        // 'é' is two bytes; a cap of 2 must not split it.
        pw.write_string("aé", 2);
        assert_eq!(pw.as_bytes(), &[0, 1, b'a']);
    }
}
