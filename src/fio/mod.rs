//! File I/O contracts consumed by the storage layers.
//!
//! The core treats the filesystem as an external collaborator: it writes WAL
//! segments and SSTables through [`WritableFile`], reads them back through
//! [`ReadableFile`], and manages paths through [`FileManager`]. All three
//! traits report success as a plain boolean; callers translate a failure into
//! the operation-level [`Error::Io`](crate::Error::Io) for whatever they were
//! doing. Note that `read` returning zero conflates EOF with error, so the
//! core cannot distinguish the two.
//!
//! Two backends ship with the crate: [`os::OsFileManager`] over `std::fs` for
//! production use, and [`mem::MemFileManager`] over a shared in-memory map
//! for tests.

pub mod mem;
pub mod os;

use std::path::Path;

pub use mem::MemFileManager;
pub use os::OsFileManager;

/// A file that accepts sequential appends.
pub trait WritableFile {
    /// Appends `data` to the end of the file.
    fn write(&mut self, data: &[u8]) -> bool;

    /// Pushes buffered data to the operating system.
    fn flush(&mut self) -> bool;

    /// Persists written data to the storage device. Stronger than `flush`.
    fn sync(&mut self) -> bool;

    /// Closes the file. Further operations fail.
    fn close(&mut self) -> bool;
}

/// A file that yields its contents sequentially.
pub trait ReadableFile {
    /// Reads up to `n` bytes, appending them to `out`.
    ///
    /// Returns the number of bytes read; zero means EOF or error.
    fn read(&mut self, n: usize, out: &mut Vec<u8>) -> usize;

    /// Closes the file. Further reads return zero.
    fn close(&mut self) -> bool;
}

/// Filesystem operations needed by the storage layers.
pub trait FileManager {
    /// Creates a writable file, truncating any existing content.
    fn new_writable(&self, path: &Path) -> Option<Box<dyn WritableFile>>;

    /// Opens an existing file for sequential reading.
    fn new_readable(&self, path: &Path) -> Option<Box<dyn ReadableFile>>;

    /// Reports whether `path` exists.
    fn exists(&self, path: &Path) -> bool;

    /// Deletes `path`. Deleting a missing file is a success.
    fn delete(&self, path: &Path) -> bool;

    /// Renames `src` to `dst`, atomically where the platform supports it.
    fn rename(&self, src: &Path, dst: &Path) -> bool;
}

/// Drains a readable file to a single buffer.
///
/// The sequential read contract cannot signal errors distinct from EOF, so
/// this simply reads until the file reports exhaustion.
pub fn read_all(file: &mut dyn ReadableFile) -> Vec<u8> {
    const CHUNK: usize = 64 * 1024;
    let mut out = Vec::new();
    while file.read(CHUNK, &mut out) > 0 {}
    out
}
