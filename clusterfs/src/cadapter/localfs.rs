//! Host directory backend: the three service files live next to each other
//! inside the VFS root directory.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::cadapter::{ServiceBackend, ServiceFile, ServiceStore};
use crate::error::{Result, VfsError};

/// Service files of one VFS root on the host file system.
///
/// Files are reopened on every call so nothing is cached between operations.
#[derive(Clone, Debug)]
pub struct LocalFsStore {
    root: PathBuf,
}

impl LocalFsStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, file: ServiceFile) -> PathBuf {
        self.root.join(file.file_name())
    }
}

impl ServiceStore for LocalFsStore {
    fn read_at(&self, file: ServiceFile, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let mut f = File::open(self.path_for(file))?;
        f.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < buf.len() {
            match f.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn write_at(&self, file: ServiceFile, offset: u64, data: &[u8]) -> io::Result<()> {
        let mut f = OpenOptions::new().write(true).open(self.path_for(file))?;
        f.seek(SeekFrom::Start(offset))?;
        f.write_all(data)?;
        f.flush()
    }

    fn len(&self, file: ServiceFile) -> io::Result<u64> {
        Ok(fs::metadata(self.path_for(file))?.len())
    }

    fn reset(&self, file: ServiceFile) -> io::Result<()> {
        OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(self.path_for(file))
            .map(|_| ())
    }
}

/// Backend over real directories.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalFsBackend;

impl LocalFsBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ServiceBackend for LocalFsBackend {
    type Store = LocalFsStore;

    fn is_dir(&self, dir: &Path) -> bool {
        dir.is_dir()
    }

    fn resolve(&self, dir: &Path) -> PathBuf {
        fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf())
    }

    fn probe(&self, dir: &Path) -> Result<Option<LocalFsStore>> {
        let store = LocalFsStore::new(dir);
        if !ServiceFile::ALL.iter().all(|f| store.path_for(*f).is_file()) {
            return Ok(None);
        }
        for file in ServiceFile::ALL {
            let path = store.path_for(file);
            if let Err(source) = File::open(&path) {
                return Err(VfsError::ServiceFileUnreadable { path, source });
            }
        }
        Ok(Some(store))
    }

    fn create(&self, dir: &Path) -> Result<LocalFsStore> {
        let store = LocalFsStore::new(dir);
        for file in ServiceFile::ALL {
            File::create(store.path_for(file))?;
        }
        Ok(store)
    }
}
