//! Immutable sorted-table storage format.
//!
//! An SSTable is a sequence of prefix-compressed data blocks followed by an
//! optional Bloom filter block, an index block mapping divider keys to block
//! locations, and a fixed 40-byte footer. All integers on disk are
//! little-endian. See the submodules for the exact layouts:
//!
//! - [`format`]: [`BlockHandle`] pointers and the file [`Footer`].
//! - [`block`]: restart-based prefix-compressed data blocks.
//! - [`index`]: divider-key routing with binary search.
//! - [`table`]: whole-file assembly and point lookup.

pub mod block;
pub mod format;
pub mod index;
pub mod table;

pub use format::{BlockHandle, Footer, FOOTER_MAGIC};
pub use table::{Table, TableBuilder, TableConfig};
