//! On-disk SSTable format types: block pointers and the fixed file footer.
//!
//! Serialized layouts (all integers little-endian):
//!
//! ```text
//! BlockHandle (16 bytes):  [offset: u64][size: u64]
//! Footer     (40 bytes):   [filter_handle(16)][index_handle(16)][magic: u64]
//! ```
//!
//! Readers locate the footer by reading the final 40 bytes of the file; one
//! seek and read is enough to discover where the filter and index live.

use crate::encoding;
use crate::error::{Error, Result};

/// File-type identifier stored in the footer.
pub const FOOTER_MAGIC: u64 = 0xF00D_BAAD_F00D_BAAD;

/// A compact pointer to a contiguous byte range within an SSTable file.
///
/// `offset` is absolute from the start of the file; `offset + size` must lie
/// within the file length, which readers enforce when slicing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockHandle {
    pub offset: u64,
    pub size: u64,
}

impl BlockHandle {
    /// Encoded length on disk.
    pub const ENCODED_LEN: usize = 16;

    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// The `(0, 0)` handle marks an absent optional block.
    pub fn is_null(&self) -> bool {
        self.offset == 0 && self.size == 0
    }

    /// Appends the 16-byte encoding to `dst`.
    pub fn encode_to(&self, dst: &mut Vec<u8>) {
        encoding::put_fixed64(dst, self.offset);
        encoding::put_fixed64(dst, self.size);
    }

    /// Decodes a handle from the front of `input`, advancing it 16 bytes.
    pub fn decode_from(input: &mut &[u8]) -> Result<Self> {
        if input.len() < Self::ENCODED_LEN {
            return Err(Error::Truncated("block handle"));
        }
        let offset = encoding::decode_fixed64(&input[0..]);
        let size = encoding::decode_fixed64(&input[8..]);
        *input = &input[Self::ENCODED_LEN..];
        Ok(Self { offset, size })
    }
}

/// Fixed-size footer written at the very end of an SSTable file.
///
/// The filter handle may be null when the table was written without a
/// filter; the index handle always points at a real block. `decode_from`
/// returns the stored magic as-is; the table reader compares it against
/// [`FOOTER_MAGIC`] when opening a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub filter_handle: BlockHandle,
    pub index_handle: BlockHandle,
    pub magic: u64,
}

impl Footer {
    /// Encoded length on disk.
    pub const ENCODED_LEN: usize = 40;

    pub fn new(filter_handle: BlockHandle, index_handle: BlockHandle) -> Self {
        Self {
            filter_handle,
            index_handle,
            magic: FOOTER_MAGIC,
        }
    }

    /// Appends the 40-byte encoding to `dst`.
    pub fn encode_to(&self, dst: &mut Vec<u8>) {
        self.filter_handle.encode_to(dst);
        self.index_handle.encode_to(dst);
        encoding::put_fixed64(dst, self.magic);
    }

    /// Decodes a footer from the front of `input`, advancing it 40 bytes.
    pub fn decode_from(input: &mut &[u8]) -> Result<Self> {
        if input.len() < Self::ENCODED_LEN {
            return Err(Error::Truncated("sstable footer"));
        }
        let mut cursor = &input[..Self::ENCODED_LEN];
        let filter_handle = BlockHandle::decode_from(&mut cursor)?;
        let index_handle = BlockHandle::decode_from(&mut cursor)?;
        let magic = encoding::decode_fixed64(cursor);

        *input = &input[Self::ENCODED_LEN..];
        Ok(Self {
            filter_handle,
            index_handle,
            magic,
        })
    }
}

impl Default for Footer {
    fn default() -> Self {
        Self {
            filter_handle: BlockHandle::default(),
            index_handle: BlockHandle::default(),
            magic: FOOTER_MAGIC,
        }
    }
}
