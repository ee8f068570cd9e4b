//! Service-file adapters (cAdapter)
//!
//! Submodules:
//! - `localfs`: host files inside a real directory
//! - `memory`: in-memory files and directories, used by tests
//!
//! A VFS root hosts exactly three service files. [`ServiceStore`] gives
//! positional byte access to them; [`ServiceBackend`] resolves which
//! directories host a VFS and creates new ones.
pub mod localfs;
pub mod memory;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceFile {
    Header,
    Table,
    Data,
}

impl ServiceFile {
    pub const ALL: [ServiceFile; 3] = [ServiceFile::Header, ServiceFile::Table, ServiceFile::Data];

    pub fn file_name(self) -> &'static str {
        match self {
            ServiceFile::Header => "header.dat",
            ServiceFile::Table => "table.dat",
            ServiceFile::Data => "data.dat",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            ServiceFile::Header => 0,
            ServiceFile::Table => 1,
            ServiceFile::Data => 2,
        }
    }
}

/// Positional access to the service files of one VFS root.
pub trait ServiceStore: Send + Sync {
    /// Reads up to `buf.len()` bytes at `offset`. Returns fewer at end of file.
    fn read_at(&self, file: ServiceFile, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes `data` at `offset`, zero-filling any gap past the current end.
    fn write_at(&self, file: ServiceFile, offset: u64, data: &[u8]) -> io::Result<()>;

    fn len(&self, file: ServiceFile) -> io::Result<u64>;

    /// Truncates the file to zero length.
    fn reset(&self, file: ServiceFile) -> io::Result<()>;

    fn read_all(&self, file: ServiceFile) -> io::Result<Vec<u8>> {
        let len = self.len(file)? as usize;
        let mut buf = vec![0u8; len];
        let n = self.read_at(file, 0, &mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Appends `data` and returns the offset it was written at.
    fn append(&self, file: ServiceFile, data: &[u8]) -> io::Result<u64> {
        let offset = self.len(file)?;
        self.write_at(file, offset, data)?;
        Ok(offset)
    }
}

impl<S: ServiceStore + ?Sized> ServiceStore for Arc<S> {
    fn read_at(&self, file: ServiceFile, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_at(file, offset, buf)
    }

    fn write_at(&self, file: ServiceFile, offset: u64, data: &[u8]) -> io::Result<()> {
        (**self).write_at(file, offset, data)
    }

    fn len(&self, file: ServiceFile) -> io::Result<u64> {
        (**self).len(file)
    }

    fn reset(&self, file: ServiceFile) -> io::Result<()> {
        (**self).reset(file)
    }
}

/// Directory-level operations needed to find or bootstrap a VFS.
pub trait ServiceBackend: Send + Sync {
    type Store: ServiceStore;

    fn is_dir(&self, dir: &Path) -> bool;

    /// Key under which volumes rooted at `dir` are shared.
    fn resolve(&self, dir: &Path) -> PathBuf {
        dir.to_path_buf()
    }

    /// Returns a store when `dir` hosts all three service files. A file that
    /// exists but cannot be read fails with `ServiceFileUnreadable`.
    fn probe(&self, dir: &Path) -> Result<Option<Self::Store>>;

    /// Creates (or truncates) the three service files in `dir`.
    fn create(&self, dir: &Path) -> Result<Self::Store>;
}
