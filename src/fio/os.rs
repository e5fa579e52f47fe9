//! Production file backend over `std::fs`.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

use tracing::{debug, warn};

use super::{FileManager, ReadableFile, WritableFile};

/// Writable file backed by an OS file handle.
///
/// No user-space buffering is kept beyond what `std::fs::File` does, so
/// `flush` forwards to the handle and `sync` maps to `sync_all` for device
/// durability.
struct OsWritableFile {
    file: Option<File>,
}

impl WritableFile for OsWritableFile {
    fn write(&mut self, data: &[u8]) -> bool {
        match &mut self.file {
            Some(file) => match file.write_all(data) {
                Ok(()) => true,
                Err(err) => {
                    warn!(error = %err, "write failed");
                    false
                }
            },
            None => false,
        }
    }

    fn flush(&mut self) -> bool {
        match &mut self.file {
            Some(file) => file.flush().is_ok(),
            None => false,
        }
    }

    fn sync(&mut self) -> bool {
        match &self.file {
            Some(file) => match file.sync_all() {
                Ok(()) => true,
                Err(err) => {
                    warn!(error = %err, "sync failed");
                    false
                }
            },
            None => false,
        }
    }

    fn close(&mut self) -> bool {
        self.file.take().is_some()
    }
}

/// Readable file backed by an OS file handle.
struct OsReadableFile {
    file: Option<File>,
}

impl ReadableFile for OsReadableFile {
    fn read(&mut self, n: usize, out: &mut Vec<u8>) -> usize {
        let Some(file) = &mut self.file else {
            return 0;
        };
        let start = out.len();
        out.resize(start + n, 0);
        // EOF and error both surface as zero bytes, per the contract.
        let read = file.read(&mut out[start..]).unwrap_or(0);
        out.truncate(start + read);
        read
    }

    fn close(&mut self) -> bool {
        self.file.take().is_some()
    }
}

/// Default [`FileManager`] over the operating system's filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileManager;

impl OsFileManager {
    pub fn new() -> Self {
        Self
    }
}

impl FileManager for OsFileManager {
    fn new_writable(&self, path: &Path) -> Option<Box<dyn WritableFile>> {
        debug!(path = %path.display(), "open writable");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .ok()?;
        Some(Box::new(OsWritableFile { file: Some(file) }))
    }

    fn new_readable(&self, path: &Path) -> Option<Box<dyn ReadableFile>> {
        let file = File::open(path).ok()?;
        Some(Box::new(OsReadableFile { file: Some(file) }))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn delete(&self, path: &Path) -> bool {
        debug!(path = %path.display(), "delete");
        match fs::remove_file(path) {
            Ok(()) => true,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => true,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "delete failed");
                false
            }
        }
    }

    fn rename(&self, src: &Path, dst: &Path) -> bool {
        debug!(src = %src.display(), dst = %dst.display(), "rename");
        fs::rename(src, dst).is_ok()
    }
}
