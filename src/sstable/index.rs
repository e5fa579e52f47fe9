//! Index block: divider keys routing lookups to data blocks.
//!
//! Entry layout, repeated back to back:
//!
//! ```text
//! [key_len: varint32][key][handle: 16 bytes]
//! ```
//!
//! followed by a trailer of entry offsets and their count:
//!
//! ```text
//! [entry_offsets: u32 x num_entries][num_entries: u32]
//! ```
//!
//! Each divider key is the smallest key of the data block its handle points
//! at, so the rightmost divider <= a search key identifies the unique block
//! that could contain it.

use byteorder::{LittleEndian, ReadBytesExt};

use crate::encoding;
use crate::error::{Error, Result};

use super::format::BlockHandle;

/// Builds an index block from strictly-increasing divider keys.
pub struct Builder {
    buffer: Vec<u8>,
    offsets: Vec<u32>,
    last_key: Vec<u8>,
    finished: bool,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            offsets: Vec::new(),
            last_key: Vec::new(),
            finished: false,
        }
    }

    /// Appends a divider entry. Keys must arrive in strictly increasing
    /// order.
    pub fn add(&mut self, divider_key: &[u8], handle: &BlockHandle) -> Result<()> {
        if self.finished {
            return Err(Error::AlreadyFinished("index block builder"));
        }
        if !self.last_key.is_empty() && self.last_key.as_slice() >= divider_key {
            return Err(Error::OutOfOrder("index block builder"));
        }

        self.offsets.push(self.buffer.len() as u32);
        encoding::put_varint32(&mut self.buffer, divider_key.len() as u32);
        self.buffer.extend_from_slice(divider_key);
        handle.encode_to(&mut self.buffer);

        self.last_key.clear();
        self.last_key.extend_from_slice(divider_key);
        Ok(())
    }

    /// Appends the offset trailer and returns the finished block bytes.
    /// Further calls return the same bytes; further `add`s fail.
    pub fn finish(&mut self) -> &[u8] {
        if !self.finished {
            for &offset in &self.offsets {
                self.buffer.extend_from_slice(&offset.to_le_bytes());
            }
            encoding::put_fixed32(&mut self.buffer, self.offsets.len() as u32);
            self.finished = true;
        }
        &self.buffer
    }

    /// Number of divider entries added so far.
    pub fn num_entries(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view over a finished index block.
pub struct Index<'a> {
    entries: &'a [u8],
    offsets: Vec<u32>,
}

impl<'a> Index<'a> {
    /// Parses the trailer and validates the offset table: offsets must be
    /// non-decreasing and lie within the entries region.
    pub fn new(block: &'a [u8]) -> Result<Self> {
        if block.len() < 4 {
            return Err(Error::Corrupt("index block trailer"));
        }
        let num_entries = encoding::decode_fixed32(&block[block.len() - 4..]) as usize;
        let offset_bytes = num_entries
            .checked_mul(4)
            .ok_or(Error::Corrupt("index block entry count"))?;
        if block.len() < 4 + offset_bytes {
            return Err(Error::Corrupt("index block offset table"));
        }

        let table_start = block.len() - 4 - offset_bytes;
        let entries = &block[..table_start];

        let mut cursor = &block[table_start..block.len() - 4];
        let mut offsets = Vec::with_capacity(num_entries);
        let mut prev: u32 = 0;
        for _ in 0..num_entries {
            let offset = cursor
                .read_u32::<LittleEndian>()
                .map_err(|_| Error::Corrupt("index block offset table"))?;
            if offset < prev || offset as usize >= entries.len() {
                return Err(Error::Corrupt("index block offsets out of range"));
            }
            prev = offset;
            offsets.push(offset);
        }

        Ok(Self { entries, offsets })
    }

    /// Returns the handle of the rightmost divider key <= `target`, or
    /// `None` when `target` sorts before the first divider.
    pub fn find(&self, target: &[u8]) -> Result<Option<BlockHandle>> {
        if self.offsets.is_empty() {
            return Ok(None);
        }

        let mut lo = 0usize;
        let mut hi = self.offsets.len() - 1;
        while lo < hi {
            let mid = (lo + hi + 1) / 2;
            let (key, _) = self.entry_at(mid)?;
            if key <= target {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }

        let (key, handle) = self.entry_at(lo)?;
        if key > target {
            return Ok(None);
        }
        Ok(Some(handle))
    }

    /// Number of divider entries.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Decodes the divider key and handle stored at entry `idx`.
    fn entry_at(&self, idx: usize) -> Result<(&'a [u8], BlockHandle)> {
        let mut rest = &self.entries[self.offsets[idx] as usize..];
        let key_len =
            encoding::get_varint32(&mut rest).ok_or(Error::Corrupt("index entry key length"))?
                as usize;
        if rest.len() < key_len + BlockHandle::ENCODED_LEN {
            return Err(Error::Corrupt("index entry bounds"));
        }
        let key = &rest[..key_len];
        let mut handle_bytes = &rest[key_len..];
        let handle = BlockHandle::decode_from(&mut handle_bytes)
            .map_err(|_| Error::Corrupt("index entry handle"))?;
        Ok((key, handle))
    }
}
