use byteorder::{BigEndian, ByteOrder};
use glam::Vec2;

use crate::error::PacketError;

#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], PacketError> {
        if self.remaining() < count {
            return Err(PacketError::UnexpectedEnd {
                offset: self.offset,
                needed: count - self.remaining(),
            });
        }
        let slice = &self.data[self.offset..self.offset + count];
        self.offset += count;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, PacketError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, PacketError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16, PacketError> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    pub fn read_i16(&mut self) -> Result<i16, PacketError> {
        Ok(BigEndian::read_i16(self.take(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32, PacketError> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    pub fn read_i32(&mut self) -> Result<i32, PacketError> {
        Ok(BigEndian::read_i32(self.take(4)?))
    }

    pub fn read_f32(&mut self) -> Result<f32, PacketError> {
        Ok(BigEndian::read_f32(self.take(4)?))
    }

    pub fn read_vec2(&mut self) -> Result<Vec2, PacketError> {
        Ok(Vec2::new(self.read_f32()?, self.read_f32()?))
    }

    pub fn read_string(&mut self, max_len: usize) -> Result<String, PacketError> {
        let len = self.read_u16()? as usize;
        if len > max_len {
            return Err(PacketError::StringTooLong { len, max: max_len });
        }
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| PacketError::InvalidUtf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PacketWriter;

    #[test]
    fn reads_what_writer_wrote() {
        let mut pw = PacketWriter::new();
        pw.write_u8(3);
        pw.write_i16(-12);
        pw.write_f32(1.5);
        pw.write_string("abc", 10);

        let mut r = PacketReader::new(pw.as_bytes());
        assert_eq!(r.read_u8().unwrap(), 3);
        assert_eq!(r.read_i16().unwrap(), -12);
        assert_eq!(r.read_f32().unwrap(), 1.5);
        assert_eq!(r.read_string(10).unwrap(), "abc");
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn short_input_is_an_error() {
        let mut r = PacketReader::new(&[0x01]);
        assert!(matches!(
            r.read_u16(),
            Err(PacketError::UnexpectedEnd { offset: 0, needed: 1 })
        ));
    }

    #[test]
    fn oversized_string_rejected() {
        let mut pw = PacketWriter::new();
        pw.write_string("abcdef", 100);
        let mut r = PacketReader::new(pw.as_bytes());
        assert!(matches!(
            r.read_string(3),
            Err(PacketError::StringTooLong { len: 6, max: 3 })
        ));
    }
}
