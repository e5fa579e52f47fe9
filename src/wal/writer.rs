//! Append-only writer for WAL segments.

use crate::error::{Error, Result};
use crate::fio::WritableFile;

use super::record::WalRecord;

/// Appends serialized frames to a writable file.
///
/// Frames are never rewritten; durability comes from calling [`sync`] after
/// the appends that must survive a crash. The writer owns the file handle
/// exclusively.
///
/// [`sync`]: WalWriter::sync
pub struct WalWriter {
    file: Box<dyn WritableFile>,
}

impl WalWriter {
    pub fn new(file: Box<dyn WritableFile>) -> Self {
        Self { file }
    }

    /// Serializes `record` and appends its frame to the segment.
    pub fn append(&mut self, record: &WalRecord) -> Result<()> {
        let frame = record.serialize_frame();
        if !self.file.write(&frame) {
            return Err(Error::Io("wal append"));
        }
        Ok(())
    }

    /// Flushes buffered frames and syncs them to the storage device.
    pub fn sync(&mut self) -> Result<()> {
        if !self.file.flush() || !self.file.sync() {
            return Err(Error::Io("wal sync"));
        }
        Ok(())
    }

    /// Closes the underlying file.
    pub fn close(&mut self) -> Result<()> {
        if !self.file.close() {
            return Err(Error::Io("wal close"));
        }
        Ok(())
    }
}
