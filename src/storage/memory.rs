use std::{
    collections::{BTreeMap, BTreeSet},
    io::{self, Cursor, Read, Write},
    sync::Arc,
};

use parking_lot::RwLock;

use super::{FileProvider, PendingWrite, check_relative_path};
use crate::error::Error;

type Files = Arc<RwLock<BTreeMap<String, Vec<u8>>>>;

/// In-process [`FileProvider`]. Clones share the same files.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileProvider {
    files: Files,
}

impl MemoryFileProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `bytes` at `path` directly, bypassing the pending-write protocol.
    pub fn insert(&self, path: impl Into<String>, bytes: Vec<u8>) {
        self.files.write().insert(normalize(&path.into()), bytes);
    }

    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        self.files.read().get(&normalize(path)).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        self.files.read().keys().cloned().collect()
    }
}

fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

struct MemoryPendingWrite {
    path: String,
    buffer: Vec<u8>,
    files: Files,
}

impl Write for MemoryPendingWrite {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl PendingWrite for MemoryPendingWrite {
    fn commit(self: Box<Self>) -> Result<(), Error> {
        let MemoryPendingWrite {
            path,
            buffer,
            files,
        } = *self;
        files.write().insert(path, buffer);
        Ok(())
    }
}

impl FileProvider for MemoryFileProvider {
    fn open_read(&self, path: &str) -> Result<Box<dyn Read + Send>, Error> {
        check_relative_path(path)?;
        let bytes = self.contents(path).ok_or_else(|| {
            Error::Storage(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file: {}", path),
            ))
        })?;
        Ok(Box::new(Cursor::new(bytes)))
    }

    fn open_write(&self, path: &str) -> Result<Box<dyn PendingWrite>, Error> {
        check_relative_path(path)?;
        Ok(Box::new(MemoryPendingWrite {
            path: normalize(path),
            buffer: Vec::new(),
            files: self.files.clone(),
        }))
    }

    fn list(&self, dir: &str) -> Result<Vec<String>, Error> {
        check_relative_path(dir)?;
        let dir = normalize(dir);
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{}/", dir)
        };
        let names: BTreeSet<String> = self
            .files
            .read()
            .keys()
            .filter_map(|path| path.strip_prefix(&prefix))
            .filter_map(|rest| rest.split('/').next())
            .map(str::to_string)
            .collect();
        Ok(names.into_iter().collect())
    }

    fn delete(&self, path: &str) -> Result<(), Error> {
        check_relative_path(path)?;
        let path = normalize(path);
        let prefix = format!("{}/", path);
        self.files
            .write()
            .retain(|existing, _| existing != &path && !existing.starts_with(&prefix));
        Ok(())
    }
}
