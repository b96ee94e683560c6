use byteorder::{ByteOrder, LittleEndian};

use crate::error::DecodeError;

/// A bounds-checked little-endian cursor over one script stream.
///
/// `base` is the absolute position of `data[0]` inside the script file, so
/// every reported offset matches what a hex editor shows for the file.
/// The cursor is `Copy`: lookahead probing works on a plain copy and commits
/// by assigning back.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    base: u64,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8], base: u64) -> Self {
        Self { data, pos: 0, base }
    }

    /// Absolute offset of the next unread byte.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.base + self.pos as u64
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos == self.data.len()
    }

    fn ensure(&self, needed: usize, what: &'static str) -> Result<(), DecodeError> {
        if self.remaining() < needed {
            Err(DecodeError::Truncated {
                offset: self.offset(),
                what,
                needed,
                remaining: self.remaining(),
            })
        } else {
            Ok(())
        }
    }

    /// Consume exactly `n` bytes. `what` names the field for error messages.
    pub fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], DecodeError> {
        self.ensure(n, what)?;
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self, what: &'static str) -> Result<u8, DecodeError> {
        Ok(self.take(1, what)?[0])
    }

    pub fn read_u16(&mut self, what: &'static str) -> Result<u16, DecodeError> {
        Ok(LittleEndian::read_u16(self.take(2, what)?))
    }

    pub fn read_u32(&mut self, what: &'static str) -> Result<u32, DecodeError> {
        Ok(LittleEndian::read_u32(self.take(4, what)?))
    }

    pub fn read_u64(&mut self, what: &'static str) -> Result<u64, DecodeError> {
        Ok(LittleEndian::read_u64(self.take(8, what)?))
    }

    pub fn read_i8(&mut self, what: &'static str) -> Result<i8, DecodeError> {
        Ok(self.read_u8(what)? as i8)
    }

    pub fn read_i16(&mut self, what: &'static str) -> Result<i16, DecodeError> {
        Ok(LittleEndian::read_i16(self.take(2, what)?))
    }

    pub fn read_i32(&mut self, what: &'static str) -> Result<i32, DecodeError> {
        Ok(LittleEndian::read_i32(self.take(4, what)?))
    }

    pub fn read_i64(&mut self, what: &'static str) -> Result<i64, DecodeError> {
        Ok(LittleEndian::read_i64(self.take(8, what)?))
    }

    pub fn read_f32(&mut self, what: &'static str) -> Result<f32, DecodeError> {
        Ok(LittleEndian::read_f32(self.take(4, what)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn little_endian_reads() {
        let bytes = [0x10, 0x00, 0xd0, 0x07, 0x00, 0x00];
        let mut cur = Cursor::new(&bytes, 0);
        assert_eq!(cur.read_u16("op").unwrap(), 0x0010);
        assert_eq!(cur.read_i32("arg").unwrap(), 2000);
        assert!(cur.is_empty());
    }

    #[test]
    fn truncation_reports_absolute_offset() {
        let bytes = [0xaa, 0xbb, 0xcc];
        let mut cur = Cursor::new(&bytes, 0x400);
        cur.read_u8("op").unwrap();
        let err = cur.read_u32("arg").unwrap_err();
        assert_eq!(
            err,
            DecodeError::Truncated {
                offset: 0x401,
                what: "arg",
                needed: 4,
                remaining: 2,
            }
        );
        assert_eq!(err.offset(), 0x401);
    }

    #[test]
    fn take_exact_then_empty() {
        let bytes = [1, 2, 3, 4];
        let mut cur = Cursor::new(&bytes, 0);
        assert_eq!(cur.take(4, "blob").unwrap(), &[1, 2, 3, 4]);
        assert!(cur.is_empty());
        assert!(cur.take(1, "blob").is_err());
    }
}
