//! Whole-table assembly and lookup.
//!
//! ## File layout
//!
//! ```text
//! +-------------------+
//! | Data Block 0      |
//! +-------------------+
//! | ...               |
//! +-------------------+
//! | Data Block k      |
//! +-------------------+
//! | Filter (optional) |
//! +-------------------+
//! | Index Block       |
//! +-------------------+
//! | Footer (40 bytes) |
//! +-------------------+
//! ```
//!
//! [`TableBuilder`] cuts data blocks as entries arrive, keeps each block's
//! first key as its index divider, feeds every key to a Bloom filter, and
//! writes the tail sections through a [`WritableFile`]. [`Table`] borrows
//! the file bytes, validates the footer, and routes point lookups filter →
//! index → data block.

use tracing::debug;

use crate::error::{Error, Result};
use crate::filter::BloomFilter;
use crate::fio::WritableFile;

use super::block;
use super::format::{BlockHandle, Footer, FOOTER_MAGIC};
use super::index;
use super::index::Index;

/// Target data block size before a new block is cut. A block may run
/// slightly over to fit the entry that crossed the threshold.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Default target false positive rate for the embedded filter.
pub const DEFAULT_FILTER_FPR: f64 = 0.01;

/// Knobs for table construction.
#[derive(Debug, Clone, Copy)]
pub struct TableConfig {
    /// Data block cut threshold in bytes.
    pub block_size: usize,
    /// Restart interval passed to each data block builder.
    pub restart_interval: usize,
    /// Target false positive rate for the filter block; `None` omits the
    /// filter entirely and writes a null filter handle.
    pub filter_fpr: Option<f64>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            restart_interval: block::DEFAULT_RESTART_INTERVAL,
            filter_fpr: Some(DEFAULT_FILTER_FPR),
        }
    }
}

/// Streams strictly-increasing entries into an SSTable file.
pub struct TableBuilder {
    file: Box<dyn WritableFile>,
    config: TableConfig,
    block: block::Builder,
    index: index::Builder,
    keys: Vec<Vec<u8>>,
    block_first_key: Vec<u8>,
    last_key: Vec<u8>,
    offset: u64,
    finished: bool,
}

impl TableBuilder {
    pub fn new(file: Box<dyn WritableFile>) -> Self {
        Self::with_config(file, TableConfig::default())
    }

    pub fn with_config(file: Box<dyn WritableFile>, config: TableConfig) -> Self {
        Self {
            file,
            config,
            block: block::Builder::with_restart_interval(config.restart_interval),
            index: index::Builder::new(),
            keys: Vec::new(),
            block_first_key: Vec::new(),
            last_key: Vec::new(),
            offset: 0,
            finished: false,
        }
    }

    /// Appends an entry. Keys must be strictly increasing across the whole
    /// table and must not be empty.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if self.finished {
            return Err(Error::AlreadyFinished("table builder"));
        }
        if key.is_empty() {
            return Err(Error::InvalidParameters("empty key"));
        }
        if !self.last_key.is_empty() && self.last_key.as_slice() >= key {
            return Err(Error::OutOfOrder("table builder"));
        }

        if self.block.is_empty() {
            self.block_first_key = key.to_vec();
        }
        self.block.add(key, value)?;
        self.keys.push(key.to_vec());
        self.last_key.clear();
        self.last_key.extend_from_slice(key);

        if self.block.current_size() >= self.config.block_size {
            self.cut_block()?;
        }
        Ok(())
    }

    /// Writes the pending block, filter, index, and footer, then syncs.
    ///
    /// Fails on an empty table: a table with no entries has no divider keys
    /// and nothing to route to.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Err(Error::AlreadyFinished("table builder"));
        }
        self.cut_block()?;
        if self.index.is_empty() {
            return Err(Error::InvalidParameters("table with no entries"));
        }

        let filter_handle = match self.config.filter_fpr {
            Some(fpr) => {
                let mut filter = BloomFilter::new(self.keys.len(), fpr);
                for key in &self.keys {
                    filter.add(key);
                }
                let bytes = filter.serialize();
                let handle = BlockHandle::new(self.offset, bytes.len() as u64);
                self.write_all(&bytes)?;
                handle
            }
            None => BlockHandle::default(),
        };

        let index_bytes = self.index.finish().to_vec();
        let index_handle = BlockHandle::new(self.offset, index_bytes.len() as u64);
        self.write_all(&index_bytes)?;

        let mut tail = Vec::with_capacity(Footer::ENCODED_LEN);
        Footer::new(filter_handle, index_handle).encode_to(&mut tail);
        self.write_all(&tail)?;

        if !self.file.flush() || !self.file.sync() {
            return Err(Error::Io("table sync"));
        }

        debug!(
            entries = self.keys.len(),
            blocks = self.index.num_entries(),
            bytes = self.offset,
            "table finished"
        );
        self.finished = true;
        Ok(())
    }

    fn cut_block(&mut self) -> Result<()> {
        if self.block.is_empty() {
            return Ok(());
        }
        let bytes = self.block.finish().to_vec();
        let handle = BlockHandle::new(self.offset, bytes.len() as u64);
        self.write_all(&bytes)?;

        let first_key = std::mem::take(&mut self.block_first_key);
        self.index.add(&first_key, &handle)?;
        self.block = block::Builder::with_restart_interval(self.config.restart_interval);
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.file.write(bytes) {
            return Err(Error::Io("table write"));
        }
        self.offset += bytes.len() as u64;
        Ok(())
    }
}

/// Read-only view over a complete SSTable.
///
/// Borrows the file bytes for its lifetime. The footer and index are
/// validated at open; data blocks are parsed lazily per lookup.
pub struct Table<'a> {
    data: &'a [u8],
    index: Index<'a>,
    filter: Option<BloomFilter>,
}

impl<'a> Table<'a> {
    pub fn open(data: &'a [u8]) -> Result<Self> {
        if data.len() < Footer::ENCODED_LEN {
            return Err(Error::Truncated("sstable footer"));
        }
        let mut tail = &data[data.len() - Footer::ENCODED_LEN..];
        let footer = Footer::decode_from(&mut tail)?;
        if footer.magic != FOOTER_MAGIC {
            return Err(Error::BadMagicOrVersion("sstable footer"));
        }

        let index = Index::new(slice_block(data, footer.index_handle, "index handle")?)?;
        let filter = if footer.filter_handle.is_null() {
            None
        } else {
            let bytes = slice_block(data, footer.filter_handle, "filter handle")?;
            Some(BloomFilter::deserialize(bytes)?)
        };

        debug!(
            blocks = index.len(),
            filtered = filter.is_some(),
            bytes = data.len(),
            "table opened"
        );
        Ok(Self {
            data,
            index,
            filter,
        })
    }

    /// Point lookup across the whole table.
    ///
    /// A negative filter probe short-circuits without touching the index or
    /// any data block.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(filter) = &self.filter {
            if !filter.might_contain(key) {
                return Ok(None);
            }
        }
        let Some(handle) = self.index.find(key)? else {
            return Ok(None);
        };
        let bytes = slice_block(self.data, handle, "data block handle")?;
        block::Block::new(bytes)?.get(key)
    }

    /// Number of data blocks the index routes to.
    pub fn num_blocks(&self) -> usize {
        self.index.len()
    }
}

/// Slices `handle`'s byte range out of the file, rejecting ranges that fall
/// outside it.
fn slice_block<'a>(data: &'a [u8], handle: BlockHandle, what: &'static str) -> Result<&'a [u8]> {
    let end = handle
        .offset
        .checked_add(handle.size)
        .ok_or(Error::Corrupt(what))?;
    if end > data.len() as u64 {
        return Err(Error::Corrupt(what));
    }
    Ok(&data[handle.offset as usize..end as usize])
}
