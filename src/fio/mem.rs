//! In-memory file backend for tests.
//!
//! All files live in a map shared between the manager and the handles it
//! vends. Writes are visible to the shared map immediately; readers snapshot
//! the content at open time, mirroring how an OS reader sees a file's bytes
//! as of its own read position rather than concurrent appends.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::{FileManager, ReadableFile, WritableFile};

type SharedFiles = Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>;

struct MemWritableFile {
    files: SharedFiles,
    path: PathBuf,
    open: bool,
}

impl WritableFile for MemWritableFile {
    fn write(&mut self, data: &[u8]) -> bool {
        if !self.open {
            return false;
        }
        let mut files = match self.files.lock() {
            Ok(guard) => guard,
            Err(_) => return false,
        };
        files.entry(self.path.clone()).or_default().extend_from_slice(data);
        true
    }

    fn flush(&mut self) -> bool {
        self.open
    }

    fn sync(&mut self) -> bool {
        self.open
    }

    fn close(&mut self) -> bool {
        std::mem::replace(&mut self.open, false)
    }
}

struct MemReadableFile {
    data: Vec<u8>,
    pos: usize,
    open: bool,
}

impl ReadableFile for MemReadableFile {
    fn read(&mut self, n: usize, out: &mut Vec<u8>) -> usize {
        if !self.open {
            return 0;
        }
        let end = (self.pos + n).min(self.data.len());
        let read = end - self.pos;
        out.extend_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        read
    }

    fn close(&mut self) -> bool {
        std::mem::replace(&mut self.open, false)
    }
}

/// [`FileManager`] over an in-memory map; cloning shares the same files.
#[derive(Debug, Default, Clone)]
pub struct MemFileManager {
    files: SharedFiles,
}

impl MemFileManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the named file's bytes, if present.
    pub fn contents(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.lock().ok()?.get(path).cloned()
    }
}

impl FileManager for MemFileManager {
    fn new_writable(&self, path: &Path) -> Option<Box<dyn WritableFile>> {
        let mut files = self.files.lock().ok()?;
        files.insert(path.to_path_buf(), Vec::new());
        Some(Box::new(MemWritableFile {
            files: Arc::clone(&self.files),
            path: path.to_path_buf(),
            open: true,
        }))
    }

    fn new_readable(&self, path: &Path) -> Option<Box<dyn ReadableFile>> {
        let files = self.files.lock().ok()?;
        let data = files.get(path)?.clone();
        Some(Box::new(MemReadableFile {
            data,
            pos: 0,
            open: true,
        }))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files
            .lock()
            .map(|files| files.contains_key(path))
            .unwrap_or(false)
    }

    fn delete(&self, path: &Path) -> bool {
        match self.files.lock() {
            Ok(mut files) => {
                files.remove(path);
                true
            }
            Err(_) => false,
        }
    }

    fn rename(&self, src: &Path, dst: &Path) -> bool {
        match self.files.lock() {
            Ok(mut files) => match files.remove(src) {
                Some(data) => {
                    files.insert(dst.to_path_buf(), data);
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }
}
