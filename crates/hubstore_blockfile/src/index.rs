//! Index entry codec.
//!
//! Every table keeps one `.ridx` file made of fixed-size entries:
//!
//! ```text
//! ┌──────────────┬──────────────────┐
//! │ filenum: u16 │ offset: u32      │   6 bytes, big-endian
//! └──────────────┴──────────────────┘
//! ```
//!
//! Entry 0 is a sentinel written when the table is created. Entry `i + 1`
//! bounds item `i`: `offset` is the cumulative byte length of segment
//! `filenum` up to and including that item.
//!
//! Entries carry no checksum. Any 6 bytes decode successfully.

/// Size of one encoded index entry in bytes.
pub const INDEX_ENTRY_SIZE: usize = 6;

/// A decoded index entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexEntry {
    /// Segment file id. Only the low 16 bits are stored.
    pub filenum: u32,
    /// Cumulative byte offset within the segment.
    pub offset: u32,
}

impl IndexEntry {
    /// Creates a new entry.
    #[must_use]
    pub const fn new(filenum: u32, offset: u32) -> Self {
        Self { filenum, offset }
    }

    /// Encodes the entry, truncating `filenum` to 16 bits.
    #[must_use]
    pub fn encode(&self) -> [u8; INDEX_ENTRY_SIZE] {
        let mut buf = [0u8; INDEX_ENTRY_SIZE];
        buf[..2].copy_from_slice(&(self.filenum as u16).to_be_bytes());
        buf[2..].copy_from_slice(&self.offset.to_be_bytes());
        buf
    }

    /// Decodes an entry.
    #[must_use]
    pub fn decode(buf: &[u8; INDEX_ENTRY_SIZE]) -> Self {
        Self {
            filenum: u32::from(u16::from_be_bytes([buf[0], buf[1]])),
            offset: u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]),
        }
    }

    /// Byte position of entry `n` within the index file.
    #[must_use]
    pub const fn position(n: u64) -> u64 {
        n * INDEX_ENTRY_SIZE as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_is_big_endian() {
        let entry = IndexEntry::new(0x0102, 0x0304_0506);
        assert_eq!(entry.encode(), [0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
    }

    #[test]
    fn decode_matches_encode() {
        let entry = IndexEntry::new(7, 123_456);
        assert_eq!(IndexEntry::decode(&entry.encode()), entry);
    }

    #[test]
    fn sentinel_is_all_zero() {
        assert_eq!(IndexEntry::default().encode(), [0u8; INDEX_ENTRY_SIZE]);
    }

    #[test]
    fn filenum_truncated_to_u16() {
        let entry = IndexEntry::new(0x1_0003, 9);
        assert_eq!(IndexEntry::decode(&entry.encode()).filenum, 3);
    }

    #[test]
    fn garbage_decodes_without_error() {
        let entry = IndexEntry::decode(&[0xFF; INDEX_ENTRY_SIZE]);
        assert_eq!(entry.filenum, 0xFFFF);
        assert_eq!(entry.offset, u32::MAX);
    }

    #[test]
    fn position_scales_by_entry_size() {
        assert_eq!(IndexEntry::position(0), 0);
        assert_eq!(IndexEntry::position(10), 60);
    }
}
