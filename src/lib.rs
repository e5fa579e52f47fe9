//! Storage-format and in-memory-index substrate for an embeddable LSM
//! key-value engine.
//!
//! Keys and values are opaque byte strings ordered lexicographically. The
//! crate provides the pieces an LSM write and read path is assembled from:
//!
//! - [`wal`]: CRC-framed write-ahead-log records, segment writer, replay.
//! - [`memtable`]: a skip list holding the sorted in-memory buffer.
//! - [`sstable`]: immutable block-structured tables with restart-point
//!   prefix compression, divider-key index, and a fixed footer.
//! - [`filter`]: the Bloom filter embedded as an SSTable's filter block.
//! - [`encoding`]: little-endian fixed/varint integer codecs and CRC32.
//! - [`fio`]: the file contracts the above layers write and read through.
//!
//! Transactions, MVCC, compaction, and garbage collection live above this
//! crate and are not part of it.

pub mod encoding;
pub mod error;
pub mod filter;
pub mod fio;
pub mod memtable;
pub mod sstable;
pub mod wal;

pub use error::{Error, Result};
pub use filter::BloomFilter;
pub use memtable::SkipList;
pub use sstable::{BlockHandle, Footer, Table, TableBuilder, TableConfig};
pub use wal::{RecordType, WalRecord, WalWriter};
