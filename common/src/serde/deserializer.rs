use std::borrow::Cow;

#[rustfmt::skip]
pub trait Deserializer {
    fn pos(&mut self) -> usize;
    fn size(&mut self) -> usize;
    fn advance_by(&mut self, amount: usize);
    fn jump_to(&mut self, pos: usize);
    fn execute_at<T>(&mut self, pos: usize, func: impl FnOnce(&mut Self) -> T) -> T;
    /// Reads up to `length` bytes. The result is shorter than requested only
    /// when the end of the input is reached.
    fn read_bytes(&mut self, length: usize) -> Cow<'_, [u8]>;

    fn remaining(&mut self) -> usize { self.size().saturating_sub(self.pos()) }
    fn is_eof(&mut self) -> bool { self.remaining() == 0 }

    fn read_array<const LENGTH: usize>(&mut self) -> [u8; LENGTH] {
        let bytes = self.read_bytes(LENGTH);
        let mut out = [0; LENGTH];
        out[..bytes.len()].copy_from_slice(&bytes);
        out
    }

    fn read_u8(&mut self) -> u8 { self.read_array::<1>()[0] }
    fn read_u16_be(&mut self) -> u16 { u16::from_be_bytes(self.read_array()) }
    fn read_u16_le(&mut self) -> u16 { u16::from_le_bytes(self.read_array()) }
    fn read_u32_be(&mut self) -> u32 { u32::from_be_bytes(self.read_array()) }
    fn read_u32_le(&mut self) -> u32 { u32::from_le_bytes(self.read_array()) }
}

pub struct SliceDeserializer<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> SliceDeserializer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            buffer: data,
            offset: 0,
        }
    }

    pub fn read_slice(&mut self, length: usize) -> &'a [u8] {
        let start = self.offset.min(self.buffer.len());
        let end = start.saturating_add(length).min(self.buffer.len());
        self.offset = self.offset.saturating_add(length);
        &self.buffer[start..end]
    }
}

impl Deserializer for SliceDeserializer<'_> {
    fn pos(&mut self) -> usize {
        self.offset
    }

    fn size(&mut self) -> usize {
        self.buffer.len()
    }

    fn advance_by(&mut self, amount: usize) {
        self.offset = self.offset.saturating_add(amount);
    }

    fn jump_to(&mut self, pos: usize) {
        self.offset = pos;
    }

    fn execute_at<T>(&mut self, pos: usize, func: impl FnOnce(&mut Self) -> T) -> T {
        let offset = self.offset;
        self.jump_to(pos);
        let result = func(self);
        self.offset = offset;
        result
    }

    fn read_bytes(&mut self, length: usize) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.read_slice(length))
    }
}

#[cfg(test)]
mod tests {
    use super::{Deserializer, SliceDeserializer};

    #[test]
    fn reads_past_end_as_zero() {
        let mut des = SliceDeserializer::new(&[0x01, 0x02, 0x03]);
        assert_eq!(des.read_u16_le(), 0x0201);
        assert_eq!(des.read_u32_be(), 0x0300_0000);
        assert!(des.is_eof());
        assert_eq!(des.remaining(), 0);
    }

    #[test]
    fn execute_at_restores_position() {
        let mut des = SliceDeserializer::new(&[0xAA, 0xBB, 0xCC, 0xDD]);
        des.advance_by(1);
        let value = des.execute_at(2, |des| des.read_u16_be());

        assert_eq!(value, 0xCCDD);
        assert_eq!(des.pos(), 1);
        assert_eq!(des.read_u8(), 0xBB);
    }
}
