//! In-memory backend: directories and service files kept in process memory.
//! Used to exercise the allocation and chain logic without touching disk.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::cadapter::{ServiceBackend, ServiceFile, ServiceStore};
use crate::error::{Result, VfsError};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    files: Mutex<[Vec<u8>; 3]>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn files(&self) -> MutexGuard<'_, [Vec<u8>; 3]> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Overwrites raw file contents.
    pub fn set_raw(&self, file: ServiceFile, data: &[u8]) {
        self.files()[file.index()] = data.to_vec();
    }
}

impl ServiceStore for InMemoryStore {
    fn read_at(&self, file: ServiceFile, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let files = self.files();
        let content = &files[file.index()];
        let start = (offset as usize).min(content.len());
        let end = (start + buf.len()).min(content.len());
        let n = end - start;
        buf[..n].copy_from_slice(&content[start..end]);
        Ok(n)
    }

    fn write_at(&self, file: ServiceFile, offset: u64, data: &[u8]) -> io::Result<()> {
        let mut files = self.files();
        let content = &mut files[file.index()];
        let start = offset as usize;
        let end = start + data.len();
        if content.len() < end {
            content.resize(end, 0);
        }
        content[start..end].copy_from_slice(data);
        Ok(())
    }

    fn len(&self, file: ServiceFile) -> io::Result<u64> {
        Ok(self.files()[file.index()].len() as u64)
    }

    fn reset(&self, file: ServiceFile) -> io::Result<()> {
        self.files()[file.index()].clear();
        Ok(())
    }
}

#[derive(Default)]
struct Namespace {
    dirs: HashSet<PathBuf>,
    volumes: HashMap<PathBuf, Arc<InMemoryStore>>,
    unreadable: HashSet<PathBuf>,
}

/// Simulated directory tree holding in-memory volumes.
#[derive(Default)]
pub struct InMemoryBackend {
    ns: Mutex<Namespace>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn ns(&self) -> MutexGuard<'_, Namespace> {
        self.ns.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `dir` and all of its ancestors as existing directories.
    pub fn with_dir<P: AsRef<Path>>(self, dir: P) -> Self {
        self.add_dir(dir);
        self
    }

    pub fn add_dir<P: AsRef<Path>>(&self, dir: P) {
        let mut ns = self.ns();
        for ancestor in dir.as_ref().ancestors() {
            ns.dirs.insert(ancestor.to_path_buf());
        }
    }

    /// Makes the service files in `dir` fail to open on the next probe.
    pub fn mark_unreadable<P: AsRef<Path>>(&self, dir: P) {
        self.ns().unreadable.insert(dir.as_ref().to_path_buf());
    }

    /// Store hosted at exactly `dir`, if any.
    pub fn store(&self, dir: &Path) -> Option<Arc<InMemoryStore>> {
        self.ns().volumes.get(dir).cloned()
    }
}

impl ServiceBackend for InMemoryBackend {
    type Store = Arc<InMemoryStore>;

    fn is_dir(&self, dir: &Path) -> bool {
        self.ns().dirs.contains(dir)
    }

    fn probe(&self, dir: &Path) -> Result<Option<Self::Store>> {
        let ns = self.ns();
        let Some(store) = ns.volumes.get(dir) else {
            return Ok(None);
        };
        if ns.unreadable.contains(dir) {
            return Err(VfsError::ServiceFileUnreadable {
                path: dir.join(ServiceFile::Header.file_name()),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "marked unreadable"),
            });
        }
        Ok(Some(store.clone()))
    }

    fn create(&self, dir: &Path) -> Result<Self::Store> {
        let mut ns = self.ns();
        if !ns.dirs.contains(dir) {
            return Err(VfsError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory `{}` does not exist", dir.display()),
            )));
        }
        let store = Arc::new(InMemoryStore::new());
        ns.volumes.insert(dir.to_path_buf(), store.clone());
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_reads_short_at_end() {
        let store = InMemoryStore::new();
        store.write_at(ServiceFile::Data, 2, b"xy").unwrap();
        let mut buf = [9u8; 8];
        assert_eq!(store.read_at(ServiceFile::Data, 0, &mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"\0\0xy");
        assert_eq!(store.read_at(ServiceFile::Data, 10, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_backend_dirs_and_volumes() {
        let backend = InMemoryBackend::new().with_dir("/srv/vfs");
        assert!(backend.is_dir(Path::new("/srv")));
        assert!(backend.is_dir(Path::new("/")));
        assert!(!backend.is_dir(Path::new("/srv/vfs/a.txt")));
        assert!(backend.probe(Path::new("/srv/vfs")).unwrap().is_none());

        backend.create(Path::new("/srv/vfs")).unwrap();
        assert!(backend.probe(Path::new("/srv/vfs")).unwrap().is_some());
        assert!(backend.create(Path::new("/nope")).is_err());

        backend.mark_unreadable("/srv/vfs");
        assert!(matches!(
            backend.probe(Path::new("/srv/vfs")),
            Err(VfsError::ServiceFileUnreadable { .. })
        ));
    }
}
