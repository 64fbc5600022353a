//! Bounds-checked byte access for image header parsing.
//!
//! Detectors read header fields at fixed offsets without validating the buffer
//! length first. Every read past the end of the buffer yields 0 instead of
//! panicking, so a truncated file produces implausible field values that the
//! detector's own size and magic checks reject.

use std::io::Read;
use std::sync::Arc;

use crate::error::Result;

/// Random-access reader over an in-memory image buffer.
///
/// All offsets passed to the accessors are relative to [`current_offset`](Self::current_offset).
#[derive(Debug, Clone)]
pub struct StreamReaderHelper {
    data: Arc<[u8]>,
    current_offset: usize,
}

impl StreamReaderHelper {
    /// Create a reader over a copy of `data`.
    pub fn new(data: &[u8]) -> Self {
        Self::from_shared(Arc::from(data))
    }

    /// Create a reader over an already shared buffer.
    pub fn from_shared(data: Arc<[u8]>) -> Self {
        Self {
            data,
            current_offset: 0,
        }
    }

    /// Copy `length` bytes from `reader` into an owned buffer.
    ///
    /// The buffer is sized to the stream once; the reader is not retained.
    pub fn from_reader<R: Read>(reader: &mut R, length: usize) -> Result<Self> {
        let mut buffer = Vec::with_capacity(length);
        reader.take(length as u64).read_to_end(&mut buffer)?;
        Ok(Self::from_shared(Arc::from(buffer)))
    }

    /// The whole underlying buffer.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Shared handle to the underlying buffer.
    pub fn shared_data(&self) -> Arc<[u8]> {
        Arc::clone(&self.data)
    }

    /// Total buffer length.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current base offset for relative reads.
    pub fn current_offset(&self) -> usize {
        self.current_offset
    }

    /// Move the base offset to an absolute position.
    pub fn set_current_offset(&mut self, offset: usize) {
        self.current_offset = offset;
    }

    /// Move the base offset forward.
    pub fn advance(&mut self, count: usize) {
        self.current_offset = self.current_offset.saturating_add(count);
    }

    /// Bytes left from the current offset to the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.current_offset)
    }

    /// Rewind to the start of the buffer.
    pub fn reset(&mut self) {
        self.current_offset = 0;
    }

    /// Read a byte, `None` if the position lies outside the buffer.
    #[inline]
    pub fn try_get_byte(&self, offset: usize) -> Option<u8> {
        let index = self.current_offset.checked_add(offset)?;
        self.data.get(index).copied()
    }

    /// Read a byte; positions outside the buffer read as 0.
    #[inline]
    pub fn get_byte(&self, offset: usize) -> u8 {
        self.try_get_byte(offset).unwrap_or(0)
    }

    /// Read a 16-bit word.
    pub fn get_word(&self, offset: usize, big_endian: bool) -> u16 {
        let b0 = self.get_byte(offset) as u16;
        let b1 = self.get_byte(offset.saturating_add(1)) as u16;
        if big_endian {
            (b0 << 8) | b1
        } else {
            (b1 << 8) | b0
        }
    }

    /// Read a 32-bit double word.
    pub fn get_dword(&self, offset: usize, big_endian: bool) -> u32 {
        let w0 = self.get_word(offset, big_endian) as u32;
        let w1 = self.get_word(offset.saturating_add(2), big_endian) as u32;
        if big_endian {
            (w0 << 16) | w1
        } else {
            (w1 << 16) | w0
        }
    }

    /// Compare the bytes at `offset` with `expected`.
    pub fn matches(&self, offset: usize, expected: &[u8]) -> bool {
        expected
            .iter()
            .enumerate()
            .all(|(i, &b)| self.try_get_byte(offset.saturating_add(i)) == Some(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_word_endianness() {
        let reader = StreamReaderHelper::new(&[0x12, 0x34, 0x56, 0x78]);
        assert_eq!(reader.get_word(0, true), 0x1234);
        assert_eq!(reader.get_word(0, false), 0x3412);
        assert_eq!(reader.get_dword(0, true), 0x1234_5678);
        assert_eq!(reader.get_dword(0, false), 0x7856_3412);
    }

    #[test]
    fn test_reads_are_relative_to_current_offset() {
        let mut reader = StreamReaderHelper::new(&[0, 1, 2, 3, 4, 5]);
        reader.advance(2);
        assert_eq!(reader.get_byte(0), 2);
        assert_eq!(reader.get_word(1, true), 0x0304);
        assert_eq!(reader.remaining(), 4);
        reader.reset();
        assert_eq!(reader.current_offset(), 0);
        assert_eq!(reader.get_byte(0), 0);
    }

    #[test]
    fn test_read_past_truncated_header_is_zero() {
        // A BMP file header cut off after the size field.
        let reader = StreamReaderHelper::new(b"BM\x10\x00");
        assert_eq!(reader.get_word(0, false), 0x4D42);
        assert_eq!(reader.get_dword(2, false), 0x0000_0010);
        assert_eq!(reader.get_dword(10, false), 0);
        assert_eq!(reader.try_get_byte(4), None);
        // Partially available word: the missing high byte reads as 0.
        assert_eq!(reader.get_word(3, false), 0x0000);
        assert_eq!(reader.get_word(2, true), 0x1000);
    }

    #[test]
    fn test_offset_overflow_is_zero() {
        let mut reader = StreamReaderHelper::new(&[0xFF; 8]);
        reader.set_current_offset(usize::MAX - 1);
        assert_eq!(reader.get_dword(0, true), 0);
        assert_eq!(reader.get_byte(usize::MAX), 0);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_matches() {
        let reader = StreamReaderHelper::new(b"\xFF\xE0\x00\x10JFIF\x00");
        assert!(reader.matches(4, b"JFIF\0"));
        assert!(!reader.matches(4, b"Exif\0"));
        assert!(!reader.matches(6, b"IF\0\0"));
    }

    #[test]
    fn test_from_reader_copies_requested_length() {
        let mut cursor = std::io::Cursor::new(vec![9u8; 32]);
        let reader = StreamReaderHelper::from_reader(&mut cursor, 16).unwrap();
        assert_eq!(reader.len(), 16);
        assert!(reader.data().iter().all(|&b| b == 9));
    }

    proptest! {
        #[test]
        fn prop_reads_never_panic(data in proptest::collection::vec(any::<u8>(), 0..64),
                                  base in 0usize..128,
                                  offset in 0usize..128) {
            let mut reader = StreamReaderHelper::new(&data);
            reader.set_current_offset(base);
            let _ = reader.get_dword(offset, true);
            let _ = reader.get_dword(offset, false);
            if base + offset >= data.len() {
                prop_assert_eq!(reader.get_byte(offset), 0);
            } else {
                prop_assert_eq!(reader.get_byte(offset), data[base + offset]);
            }
        }
    }
}
