// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Read/write cursors over raw partition buffers.
//!
//! Reading EBX is seek-heavy: field offsets are absolute within an instance
//! image and out-of-line sections (arrays, strings, boxed values) are visited
//! mid-field. `Cursor::at` gives the scoped save/jump/restore discipline the
//! codecs rely on; nothing in this crate tracks stream position globally.

use crate::error::{Error, Result};

/// Generate read methods for primitive types.
///
/// Each generated method checks buffer bounds (returning
/// `Error::CorruptFormat` on overflow), reads N little-endian bytes and
/// advances the offset.
macro_rules! impl_read_le {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self) -> Result<$type> {
            if self.offset + $size > self.buffer.len() {
                return Err(Error::CorruptFormat {
                    offset: self.offset,
                    reason: "unexpected end of buffer".into(),
                });
            }
            let mut bytes = [0u8; $size];
            bytes.copy_from_slice(&self.buffer[self.offset..self.offset + $size]);
            self.offset += $size;
            Ok(<$type>::from_le_bytes(bytes))
        }
    };
}

/// Generate write methods for primitive types, bounds-checked like the
/// read side.
macro_rules! impl_write_le {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self, value: $type) -> Result<()> {
            if self.offset + $size > self.buffer.len() {
                return Err(Error::CorruptFormat {
                    offset: self.offset,
                    reason: "write past end of buffer".into(),
                });
            }
            let bytes = value.to_le_bytes();
            self.buffer[self.offset..self.offset + $size].copy_from_slice(&bytes);
            self.offset += $size;
            Ok(())
        }
    };
}

/// Immutable cursor for reading (bounds-checked, zero-copy)
pub struct Cursor<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    impl_read_le!(read_u8, u8, 1);
    impl_read_le!(read_i8, i8, 1);
    impl_read_le!(read_u16_le, u16, 2);
    impl_read_le!(read_i16_le, i16, 2);
    impl_read_le!(read_u32_le, u32, 4);
    impl_read_le!(read_i32_le, i32, 4);
    impl_read_le!(read_u64_le, u64, 8);
    impl_read_le!(read_i64_le, i64, 8);

    pub fn read_f32_le(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32_le()?))
    }

    pub fn read_f64_le(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64_le()?))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.offset + len > self.buffer.len() {
            return Err(Error::CorruptFormat {
                offset: self.offset,
                reason: "unexpected end of buffer".into(),
            });
        }
        let slice = &self.buffer[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }

    pub fn is_eof(&self) -> bool {
        self.offset >= self.buffer.len()
    }

    /// Jump to an absolute position. Seeking to the buffer end is allowed,
    /// seeking past it is not.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.buffer.len() {
            return Err(Error::CorruptFormat {
                offset: pos,
                reason: "seek past end of buffer".into(),
            });
        }
        self.offset = pos;
        Ok(())
    }

    pub fn align(&mut self, alignment: u8) -> Result<()> {
        if alignment <= 1 {
            return Ok(());
        }
        let mask = (alignment as usize) - 1;
        self.offset = (self.offset + mask) & !mask;
        if self.offset > self.buffer.len() {
            return Err(Error::CorruptFormat {
                offset: self.offset,
                reason: "unexpected end of buffer".into(),
            });
        }
        Ok(())
    }

    /// Scoped out-of-line read: jump to `pos`, run `f`, restore the previous
    /// position whether or not `f` succeeded.
    pub fn at<T>(
        &mut self,
        pos: usize,
        f: impl FnOnce(&mut Cursor<'a>) -> Result<T>,
    ) -> Result<T> {
        let saved = self.offset;
        self.seek(pos)?;
        let out = f(self);
        self.offset = saved;
        out
    }
}

/// Mutable cursor for patching already-emitted bytes (bounds-checked)
pub struct CursorMut<'a> {
    buffer: &'a mut [u8],
    offset: usize,
}

impl<'a> CursorMut<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    impl_write_le!(write_u8, u8, 1);
    impl_write_le!(write_u16_le, u16, 2);
    impl_write_le!(write_u32_le, u32, 4);
    impl_write_le!(write_i32_le, i32, 4);
    impl_write_le!(write_u64_le, u64, 8);

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        if self.offset + data.len() > self.buffer.len() {
            return Err(Error::CorruptFormat {
                offset: self.offset,
                reason: "write past end of buffer".into(),
            });
        }
        self.buffer[self.offset..self.offset + data.len()].copy_from_slice(data);
        self.offset += data.len();
        Ok(())
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.buffer.len() {
            return Err(Error::CorruptFormat {
                offset: pos,
                reason: "seek past end of buffer".into(),
            });
        }
        self.offset = pos;
        Ok(())
    }

    /// Read back a previously written little-endian u64 without moving the
    /// write position. The fixup pass uses this to recover placeholder values.
    pub fn peek_u64_le(&self, pos: usize) -> Result<u64> {
        if pos + 8 > self.buffer.len() {
            return Err(Error::CorruptFormat {
                offset: pos,
                reason: "unexpected end of buffer".into(),
            });
        }
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.buffer[pos..pos + 8]);
        Ok(u64::from_le_bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_read_overflow_reports_offset() {
        let buffer = [0u8; 1];
        let mut cursor = Cursor::new(&buffer);
        assert_eq!(cursor.read_u8().expect("Read u8 should succeed"), 0);

        let err = cursor.read_u8().unwrap_err();
        match err {
            Error::CorruptFormat { offset, reason } => {
                assert_eq!(offset, 1);
                assert_eq!(reason, "unexpected end of buffer");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_cursor_roundtrip_across_numeric_types() {
        let mut buffer = vec![0u8; 64];
        {
            let mut writer = CursorMut::new(&mut buffer);
            writer.write_u8(0xAB).expect("Write u8 should succeed");
            writer.write_u16_le(0xCDEF).expect("Write u16 should succeed");
            writer
                .write_u32_le(0x1234_5678)
                .expect("Write u32 should succeed");
            writer
                .write_u64_le(0x1122_3344_5566_7788)
                .expect("Write u64 should succeed");
            writer.write_i32_le(-42).expect("Write i32 should succeed");
        }

        let mut reader = Cursor::new(&buffer);
        assert_eq!(reader.read_u8().expect("Read u8 should succeed"), 0xAB);
        assert_eq!(
            reader.read_u16_le().expect("Read u16 should succeed"),
            0xCDEF
        );
        assert_eq!(
            reader.read_u32_le().expect("Read u32 should succeed"),
            0x1234_5678
        );
        assert_eq!(
            reader.read_u64_le().expect("Read u64 should succeed"),
            0x1122_3344_5566_7788
        );
        assert_eq!(reader.read_i32_le().expect("Read i32 should succeed"), -42);
    }

    #[test]
    fn test_cursor_seek_and_scoped_at() {
        let buffer: Vec<u8> = (0..32).collect();
        let mut cursor = Cursor::new(&buffer);
        cursor.seek(4).expect("Seek should succeed");
        assert_eq!(cursor.read_u8().expect("Read u8 should succeed"), 4);

        let peeked = cursor
            .at(16, |c| c.read_u8())
            .expect("Scoped read should succeed");
        assert_eq!(peeked, 16);
        // Position restored to just after the earlier read.
        assert_eq!(cursor.offset(), 5);
    }

    #[test]
    fn test_cursor_at_restores_position_on_error() {
        let buffer = [0u8; 8];
        let mut cursor = Cursor::new(&buffer);
        cursor.seek(2).expect("Seek should succeed");
        let result = cursor.at(6, |c| c.read_u32_le());
        assert!(result.is_err());
        assert_eq!(cursor.offset(), 2);
    }

    #[test]
    fn test_cursor_seek_past_end_fails() {
        let buffer = [0u8; 4];
        let mut cursor = Cursor::new(&buffer);
        assert!(cursor.seek(4).is_ok());
        assert!(cursor.seek(5).is_err());
    }

    #[test]
    fn test_cursor_align() {
        let buffer = [0u8; 16];
        let mut cursor = Cursor::new(&buffer);
        cursor.read_u8().expect("Read u8 should succeed");
        cursor.align(4).expect("Align should succeed");
        assert_eq!(cursor.offset(), 4);
        cursor.align(1).expect("Align 1 is a no-op");
        assert_eq!(cursor.offset(), 4);
        cursor.align(16).expect("Align should succeed");
        assert_eq!(cursor.offset(), 16);
        assert!(cursor.align(32).is_err());
    }

    #[test]
    fn test_cursor_mut_peek_reads_back_written_word() {
        let mut buffer = vec![0u8; 16];
        let mut cursor = CursorMut::new(&mut buffer);
        cursor.seek(8).expect("Seek should succeed");
        cursor
            .write_u64_le(0xDEAD_BEEF)
            .expect("Write u64 should succeed");
        assert_eq!(
            cursor.peek_u64_le(8).expect("Peek should succeed"),
            0xDEAD_BEEF
        );
        assert!(cursor.peek_u64_le(9).is_err());
    }
}
