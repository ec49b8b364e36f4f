use std::{
    fs::{self, File},
    io::{self, BufReader, Read, Write},
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

use super::{FileProvider, PendingWrite, check_relative_path};
use crate::error::Error;

/// [`FileProvider`] rooted at a directory on the local filesystem.
///
/// Writes go to a temporary file in the target directory and are renamed over
/// the target on commit, so readers see either the old or the new document.
#[derive(Debug, Clone)]
pub struct FsFileProvider {
    root: PathBuf,
}

impl FsFileProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, Error> {
        check_relative_path(path)?;
        Ok(path
            .split('/')
            .filter(|segment| !segment.is_empty() && *segment != ".")
            .fold(self.root.clone(), |acc, segment| acc.join(segment)))
    }
}

struct FsPendingWrite {
    file: NamedTempFile,
    target: PathBuf,
}

impl Write for FsPendingWrite {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl PendingWrite for FsPendingWrite {
    fn commit(self: Box<Self>) -> Result<(), Error> {
        let FsPendingWrite { mut file, target } = *self;
        file.flush()?;
        file.as_file().sync_all()?;
        file.persist(&target).map_err(|e| Error::Storage(e.error))?;
        Ok(())
    }
}

impl FileProvider for FsFileProvider {
    fn open_read(&self, path: &str) -> Result<Box<dyn Read + Send>, Error> {
        let file = File::open(self.resolve(path)?)?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn open_write(&self, path: &str) -> Result<Box<dyn PendingWrite>, Error> {
        let target = self.resolve(path)?;
        let parent = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        fs::create_dir_all(&parent)?;
        let file = NamedTempFile::new_in(&parent)?;
        Ok(Box::new(FsPendingWrite { file, target }))
    }

    fn list(&self, dir: &str) -> Result<Vec<String>, Error> {
        let entries = match fs::read_dir(self.resolve(dir)?) {
            Ok(entries) => entries,
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn delete(&self, path: &str) -> Result<(), Error> {
        let target = self.resolve(path)?;
        let outcome = if target.is_dir() {
            fs::remove_dir_all(&target)
        } else {
            fs::remove_file(&target)
        };
        match outcome {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}
