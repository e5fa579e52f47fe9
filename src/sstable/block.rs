//! Data block: restart-based prefix-compressed key-value entries.
//!
//! Entry layout, repeated back to back:
//!
//! ```text
//! [shared: u32][non_shared: u32][value_len: u32][key_delta][value]
//! ```
//!
//! `shared` is the length of the prefix the key has in common with the
//! previous key of the same restart run. Every `restart_interval` entries a
//! new run begins and the key is stored in full (`shared == 0`); the offsets
//! of those run starts accumulate in a trailer:
//!
//! ```text
//! [restart_offsets: u32 x num_restarts][num_restarts: u32]
//! ```
//!
//! Lookups binary-search the restart offsets (whose keys are stored whole)
//! and then scan a single run, reconstructing keys incrementally.

use byteorder::{LittleEndian, ReadBytesExt};
use std::cmp::Ordering;

use crate::encoding;
use crate::error::{Error, Result};

/// Default number of entries between restart points.
pub const DEFAULT_RESTART_INTERVAL: usize = 16;

const ENTRY_HEADER_LEN: usize = 12;

/// Builds a data block from strictly-increasing keys.
pub struct Builder {
    buffer: Vec<u8>,
    restarts: Vec<u32>,
    last_key: Vec<u8>,
    restart_interval: usize,
    counter: usize,
    num_entries: usize,
    finished: bool,
}

impl Builder {
    pub fn new() -> Self {
        Self::with_restart_interval(DEFAULT_RESTART_INTERVAL)
    }

    /// Creates a builder placing a restart point every `interval` entries.
    /// Intervals below one are clamped to one.
    pub fn with_restart_interval(interval: usize) -> Self {
        Self {
            buffer: Vec::new(),
            restarts: vec![0],
            last_key: Vec::new(),
            restart_interval: interval.max(1),
            counter: 0,
            num_entries: 0,
            finished: false,
        }
    }

    /// Appends an entry. Keys must arrive in strictly increasing order.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if self.finished {
            return Err(Error::AlreadyFinished("data block builder"));
        }
        if !self.last_key.is_empty() && self.last_key.as_slice() >= key {
            return Err(Error::OutOfOrder("data block builder"));
        }

        let shared = if self.counter < self.restart_interval {
            shared_prefix_len(&self.last_key, key)
        } else {
            self.restarts.push(self.buffer.len() as u32);
            self.counter = 0;
            0
        };
        let non_shared = key.len() - shared;

        encoding::put_fixed32(&mut self.buffer, shared as u32);
        encoding::put_fixed32(&mut self.buffer, non_shared as u32);
        encoding::put_fixed32(&mut self.buffer, value.len() as u32);
        self.buffer.extend_from_slice(&key[shared..]);
        self.buffer.extend_from_slice(value);

        self.last_key.clear();
        self.last_key.extend_from_slice(key);
        self.counter += 1;
        self.num_entries += 1;
        Ok(())
    }

    /// Appends the restart trailer and returns the finished block bytes.
    /// Further calls return the same bytes; further `add`s fail.
    pub fn finish(&mut self) -> &[u8] {
        if !self.finished {
            for &offset in &self.restarts {
                self.buffer.extend_from_slice(&offset.to_le_bytes());
            }
            encoding::put_fixed32(&mut self.buffer, self.restarts.len() as u32);
            self.finished = true;
        }
        &self.buffer
    }

    /// Upper bound on the finished block size. Over-estimates by one restart
    /// slot; treat as a bound, not an exact size.
    pub fn current_size(&self) -> usize {
        self.buffer.len() + (self.restarts.len() + 1) * 4
    }

    /// Number of entries added so far.
    pub fn num_entries(&self) -> usize {
        self.num_entries
    }

    pub fn is_empty(&self) -> bool {
        self.num_entries == 0
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

fn shared_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

/// Read-only view over a finished data block.
///
/// Borrows the block bytes for its lifetime; the trailer is validated up
/// front and the restart table loaded, so `get` only touches the entries
/// region.
pub struct Block<'a> {
    entries: &'a [u8],
    restarts: Vec<u32>,
}

impl<'a> Block<'a> {
    pub fn new(block: &'a [u8]) -> Result<Self> {
        if block.len() < 4 {
            return Err(Error::Corrupt("data block trailer"));
        }
        let num_restarts = encoding::decode_fixed32(&block[block.len() - 4..]) as usize;
        let restart_bytes = num_restarts
            .checked_mul(4)
            .ok_or(Error::Corrupt("data block restart count"))?;
        if block.len() < 4 + restart_bytes {
            return Err(Error::Corrupt("data block restart table"));
        }

        let table_start = block.len() - 4 - restart_bytes;
        let mut cursor = &block[table_start..block.len() - 4];
        let mut restarts = Vec::with_capacity(num_restarts);
        for _ in 0..num_restarts {
            let offset = cursor
                .read_u32::<LittleEndian>()
                .map_err(|_| Error::Corrupt("data block restart table"))?;
            restarts.push(offset);
        }

        Ok(Self {
            entries: &block[..table_start],
            restarts,
        })
    }

    /// Point lookup: returns the value stored under `target`, or `None`.
    pub fn get(&self, target: &[u8]) -> Result<Option<Vec<u8>>> {
        if self.restarts.is_empty() {
            return Ok(None);
        }

        // Rightmost restart whose (fully stored) key is <= target.
        let mut lo = 0usize;
        let mut hi = self.restarts.len() - 1;
        while lo < hi {
            let mid = (lo + hi + 1) / 2;
            let anchor = self.restart_key(self.restarts[mid] as usize)?;
            if anchor <= target {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }

        // Scan that run, rebuilding keys from shared prefixes.
        let mut offset = self.restarts[lo] as usize;
        let run_end = self
            .restarts
            .get(lo + 1)
            .map_or(self.entries.len(), |&o| o as usize);
        let mut prev_key: Vec<u8> = Vec::new();

        while offset < run_end && offset < self.entries.len() {
            let (shared, non_shared, value_len) = self.entry_header(offset)?;
            if shared > prev_key.len() {
                return Err(Error::Corrupt("shared prefix exceeds previous key"));
            }

            let delta_start = offset + ENTRY_HEADER_LEN;
            let value_start = delta_start + non_shared;

            let mut key = Vec::with_capacity(shared + non_shared);
            key.extend_from_slice(&prev_key[..shared]);
            key.extend_from_slice(&self.entries[delta_start..value_start]);

            match key.as_slice().cmp(target) {
                Ordering::Equal => {
                    return Ok(Some(
                        self.entries[value_start..value_start + value_len].to_vec(),
                    ));
                }
                Ordering::Greater => return Ok(None),
                Ordering::Less => {}
            }

            prev_key = key;
            offset = value_start + value_len;
        }

        Ok(None)
    }

    /// Decodes the header at `offset` and bounds-checks the whole entry.
    fn entry_header(&self, offset: usize) -> Result<(usize, usize, usize)> {
        if offset + ENTRY_HEADER_LEN > self.entries.len() {
            return Err(Error::Corrupt("data block entry header"));
        }
        let shared = encoding::decode_fixed32(&self.entries[offset..]) as usize;
        let non_shared = encoding::decode_fixed32(&self.entries[offset + 4..]) as usize;
        let value_len = encoding::decode_fixed32(&self.entries[offset + 8..]) as usize;

        let need = ENTRY_HEADER_LEN as u64 + non_shared as u64 + value_len as u64;
        if offset as u64 + need > self.entries.len() as u64 {
            return Err(Error::Corrupt("data block entry bounds"));
        }
        Ok((shared, non_shared, value_len))
    }

    /// Materializes the key anchored at a restart offset, which must be
    /// stored in full.
    fn restart_key(&self, offset: usize) -> Result<&'a [u8]> {
        let (shared, non_shared, _) = self.entry_header(offset)?;
        if shared != 0 {
            return Err(Error::Corrupt("restart point with shared prefix"));
        }
        let start = offset + ENTRY_HEADER_LEN;
        Ok(&self.entries[start..start + non_shared])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entries() -> Vec<(&'static [u8], &'static [u8])> {
        vec![
            (b"apple", b"A"),
            (b"apples", b"AA"),
            (b"apply", b"AAA"),
            (b"banana", b"B"),
            (b"carrot", b"C"),
            (b"carrots", b"CC"),
        ]
    }

    fn build(interval: usize, entries: &[(&[u8], &[u8])]) -> Vec<u8> {
        let mut builder = Builder::with_restart_interval(interval);
        for (key, value) in entries {
            builder.add(key, value).unwrap();
        }
        builder.finish().to_vec()
    }

    #[test]
    fn round_trip_with_prefix_sharing() {
        let entries = sample_entries();
        let bytes = build(2, &entries);
        let block = Block::new(&bytes).unwrap();

        for (key, value) in &entries {
            assert_eq!(block.get(key).unwrap().as_deref(), Some(*value));
        }
        assert_eq!(block.get(b"appl").unwrap(), None);
        assert_eq!(block.get(b"blueberry").unwrap(), None);
        assert_eq!(block.get(b"zzz").unwrap(), None);
    }

    #[test]
    fn lookup_holds_for_all_restart_intervals() {
        let keys: Vec<Vec<u8>> = (0..200).map(|i| format!("key_{i:04}").into_bytes()).collect();

        for interval in [1usize, 2, 4, 16] {
            let mut builder = Builder::with_restart_interval(interval);
            for (i, key) in keys.iter().enumerate() {
                builder.add(key, format!("value_{i}").as_bytes()).unwrap();
            }
            let bytes = builder.finish().to_vec();
            let block = Block::new(&bytes).unwrap();

            for (i, key) in keys.iter().enumerate() {
                assert_eq!(
                    block.get(key).unwrap(),
                    Some(format!("value_{i}").into_bytes()),
                    "interval {interval}"
                );
            }
            assert_eq!(block.get(b"key_").unwrap(), None);
            assert_eq!(block.get(b"key_0000a").unwrap(), None);
            assert_eq!(block.get(b"zzz").unwrap(), None);
        }
    }

    #[test]
    fn rejects_out_of_order_and_duplicate_keys() {
        let mut builder = Builder::new();
        builder.add(b"b", b"1").unwrap();
        assert!(matches!(
            builder.add(b"b", b"2"),
            Err(Error::OutOfOrder(_))
        ));
        assert!(matches!(
            builder.add(b"a", b"3"),
            Err(Error::OutOfOrder(_))
        ));
    }

    #[test]
    fn add_after_finish_fails_and_finish_is_idempotent() {
        let mut builder = Builder::new();
        builder.add(b"a", b"1").unwrap();

        let first = builder.finish().to_vec();
        assert!(matches!(
            builder.add(b"b", b"2"),
            Err(Error::AlreadyFinished(_))
        ));
        assert_eq!(builder.finish(), first.as_slice());
    }

    #[test]
    fn current_size_bounds_the_finished_block() {
        let mut builder = Builder::with_restart_interval(2);
        for (key, value) in sample_entries() {
            builder.add(key, value).unwrap();
            assert!(builder.current_size() >= builder.buffer.len());
        }
        let bound = builder.current_size();
        let finished = builder.finish().len();
        assert!(finished <= bound);
    }

    #[test]
    fn empty_block_resolves_lookups_to_not_found() {
        let mut builder = Builder::new();
        let bytes = builder.finish().to_vec();

        let block = Block::new(&bytes).unwrap();
        assert_eq!(block.get(b"anything").unwrap(), None);
    }

    #[test]
    fn empty_restart_table_is_accepted() {
        // num_restarts = 0 with no entries: a degenerate but tolerated block.
        let bytes = 0u32.to_le_bytes().to_vec();
        let block = Block::new(&bytes).unwrap();
        assert_eq!(block.get(b"k").unwrap(), None);
    }

    #[test]
    fn too_small_block_is_corrupt() {
        assert!(matches!(Block::new(b"abc"), Err(Error::Corrupt(_))));
    }

    #[test]
    fn truncated_restart_table_is_corrupt() {
        let bytes = build(16, &[(b"a".as_slice(), b"1".as_slice())]);
        let truncated = &bytes[..bytes.len() - 5];
        assert!(matches!(Block::new(truncated), Err(Error::Corrupt(_))));
    }

    #[test]
    fn restart_anchor_with_shared_prefix_is_corrupt() {
        // Hand-built block: one entry whose header claims shared = 3, with a
        // restart table pointing at it.
        let mut bytes = Vec::new();
        encoding::put_fixed32(&mut bytes, 3); // shared != 0 at a restart
        encoding::put_fixed32(&mut bytes, 1); // non_shared
        encoding::put_fixed32(&mut bytes, 0); // value_len
        bytes.push(b'x');
        encoding::put_fixed32(&mut bytes, 0); // restart offset
        encoding::put_fixed32(&mut bytes, 0); // second restart offset
        encoding::put_fixed32(&mut bytes, 2); // num_restarts

        let block = Block::new(&bytes).unwrap();
        // The binary search probes restart 1, decodes the anchor at offset
        // 0, and trips on the non-zero shared length.
        assert!(block.get(b"x").is_err());
    }

    #[test]
    fn entry_overrunning_the_block_is_corrupt() {
        let mut bytes = Vec::new();
        encoding::put_fixed32(&mut bytes, 0); // shared
        encoding::put_fixed32(&mut bytes, 100); // non_shared beyond region
        encoding::put_fixed32(&mut bytes, 0); // value_len
        bytes.push(b'x');
        encoding::put_fixed32(&mut bytes, 0); // restart offset
        encoding::put_fixed32(&mut bytes, 1); // num_restarts

        let block = Block::new(&bytes).unwrap();
        assert!(matches!(block.get(b"x"), Err(Error::Corrupt(_))));
    }

    #[test]
    fn truncation_never_panics() {
        let bytes = build(2, &sample_entries());
        for len in 0..bytes.len() {
            // Either a structural error at construction or a clean result
            // from the lookup; any truncation must be caught, never crash.
            if let Ok(block) = Block::new(&bytes[..len]) {
                let _ = block.get(b"banana");
            }
        }
    }
}
