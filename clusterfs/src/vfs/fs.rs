//! ClusterFs: path-level open/create on top of shared volumes.
//!
//! Every handle keeps its [`Volume`] alive through an `Arc`; the registry
//! only holds `Weak` references, so a root's locks are shared from its first
//! open until its last handle goes away.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::info;

use crate::cadapter::ServiceBackend;
use crate::cadapter::localfs::LocalFsBackend;
use crate::config::VfsConfig;
use crate::error::{Result, VfsError};
use crate::meta::OpenMode;
use crate::meta::codec::is_valid_name;
use crate::vfs::handles::FileHandle;
use crate::vfs::locator::{initialize, locate};
use crate::vfs::volume::Volume;

pub type Handle<B> = FileHandle<<B as ServiceBackend>::Store>;

pub struct ClusterFs<B: ServiceBackend = LocalFsBackend> {
    backend: B,
    config: VfsConfig,
    volumes: Mutex<HashMap<PathBuf, Weak<Volume<B::Store>>>>,
    /// Held while locating or initializing a root.
    init_lock: Mutex<()>,
}

/// Header rows are keyed by the nominal path exactly as given.
fn nominal_name(path: &Path) -> Result<&str> {
    let name = path
        .to_str()
        .ok_or_else(|| VfsError::InvalidPath(path.display().to_string()))?;
    if !is_valid_name(name) {
        return Err(VfsError::InvalidName(name.to_string()));
    }
    Ok(name)
}

impl ClusterFs<LocalFsBackend> {
    /// File system over host directories.
    pub fn new(config: VfsConfig) -> Result<Self> {
        Self::with_backend(LocalFsBackend::new(), config)
    }
}

impl<B: ServiceBackend> ClusterFs<B> {
    pub fn with_backend(backend: B, config: VfsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            backend,
            config,
            volumes: Mutex::new(HashMap::new()),
            init_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &VfsConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Volume hosting `path`. Fails with `VfsNotFound` when no directory
    /// above it holds the service files.
    pub fn mount<P: AsRef<Path>>(&self, path: P) -> Result<Arc<Volume<B::Store>>> {
        let _guard = self.lock_init();
        self.mount_locked(path.as_ref())
    }

    fn lock_init(&self) -> MutexGuard<'_, ()> {
        self.init_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Caller holds the init lock, so no VFS is half-written.
    fn mount_locked(&self, path: &Path) -> Result<Arc<Volume<B::Store>>> {
        let (root, store) = locate(&self.backend, path)?;
        Ok(self.register(root, store))
    }

    /// Live volume for `root`, if any handle still holds it.
    pub fn volume_for<P: AsRef<Path>>(&self, root: P) -> Option<Arc<Volume<B::Store>>> {
        let key = self.backend.resolve(root.as_ref());
        let mut volumes = self.volumes.lock().unwrap_or_else(PoisonError::into_inner);
        volumes.retain(|_, v| v.strong_count() > 0);
        volumes.get(&key).and_then(Weak::upgrade)
    }

    fn register(&self, root: PathBuf, store: B::Store) -> Arc<Volume<B::Store>> {
        let key = self.backend.resolve(&root);
        let mut volumes = self.volumes.lock().unwrap_or_else(PoisonError::into_inner);
        volumes.retain(|_, v| v.strong_count() > 0);
        if let Some(volume) = volumes.get(&key).and_then(Weak::upgrade) {
            return volume;
        }
        let volume = Arc::new(Volume::new(root, store, self.config.max_handles));
        volumes.insert(key, Arc::downgrade(&volume));
        info!(root = %volume.root().display(), "mounted vfs");
        volume
    }

    /// Mounts `path`, initializing a VFS first when none exists.
    fn mount_or_init(&self, path: &Path) -> Result<Arc<Volume<B::Store>>> {
        let _guard = self.lock_init();
        match self.mount_locked(path) {
            Err(VfsError::VfsNotFound(_)) => {}
            other => return other,
        }
        let (root, store) = initialize(&self.backend, path, &self.config)?;
        Ok(self.register(root, store))
    }

    /// Opens an existing file for reading.
    pub fn try_open<P: AsRef<Path>>(&self, path: P) -> Result<Handle<B>> {
        let name = nominal_name(path.as_ref())?;
        let volume = self.mount(path.as_ref())?;
        let (first, cluster_size) = {
            let header = volume.lock_header();
            let info = header.header().read_info()?;
            (
                header.open_for(name, OpenMode::ReadOnly)?,
                info.cluster_size,
            )
        };
        Ok(FileHandle::new(
            volume,
            name,
            first,
            cluster_size,
            OpenMode::ReadOnly,
        ))
    }

    /// Opens a file for writing from its first byte, registering it (and
    /// the VFS) when missing.
    pub fn try_create<P: AsRef<Path>>(&self, path: P) -> Result<Handle<B>> {
        let name = nominal_name(path.as_ref())?;
        let volume = self.mount_or_init(path.as_ref())?;
        let (first, cluster_size) = {
            let header = volume.lock_header();
            let info = header.header().read_info()?;
            let first = match header.open_for(name, OpenMode::WriteOnly) {
                Ok(first) => first,
                Err(VfsError::FileNotFound(_)) => header
                    .lock_table()
                    .register_new_file(name, OpenMode::WriteOnly)?,
                Err(e) => return Err(e),
            };
            (first, info.cluster_size)
        };
        Ok(FileHandle::new(
            volume,
            name,
            first,
            cluster_size,
            OpenMode::WriteOnly,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cadapter::memory::InMemoryBackend;
    use crate::vfs::handles::FileStatus;

    fn fs() -> ClusterFs<InMemoryBackend> {
        ClusterFs::with_backend(InMemoryBackend::new().with_dir("/srv"), VfsConfig::default())
            .unwrap()
    }

    #[test]
    fn test_open_without_vfs_fails() {
        let fs = fs();
        assert!(matches!(
            fs.try_open("/srv/a.txt"),
            Err(VfsError::VfsNotFound(_))
        ));
        assert!(fs.backend().store(Path::new("/srv")).is_none());
    }

    #[test]
    fn test_create_bootstraps_and_round_trips() {
        let fs = fs();
        let mut w = fs.try_create("/srv/a.txt").unwrap();
        assert_eq!(w.status(), FileStatus::WriteOnly);
        assert_eq!(w.root(), Path::new("/srv"));
        assert_eq!(w.write(b"0123456789ABCDE"), 15);
        w.close();

        let mut r = fs.try_open("/srv/a.txt").unwrap();
        assert_eq!(r.read_vec(15), b"0123456789ABCDE");
        assert_eq!(r.volume().chain(r.first_cluster()).unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_open_unknown_file() {
        let fs = fs();
        fs.try_create("/srv/a.txt").unwrap();
        assert!(matches!(
            fs.try_open("/srv/b.txt"),
            Err(VfsError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_writer_excludes_reader_until_closed() {
        let fs = fs();
        let mut w = fs.try_create("/srv/a.txt").unwrap();
        assert!(matches!(
            fs.try_open("/srv/a.txt"),
            Err(VfsError::ModeConflict {
                active: OpenMode::WriteOnly,
                ..
            })
        ));
        w.close();

        let _r = fs.try_open("/srv/a.txt").unwrap();
        assert!(matches!(
            fs.try_create("/srv/a.txt"),
            Err(VfsError::ModeConflict {
                active: OpenMode::ReadOnly,
                ..
            })
        ));
    }

    #[test]
    fn test_second_writer_is_refused() {
        let fs = fs();
        let mut w = fs.try_create("/srv/a.txt").unwrap();
        assert!(matches!(
            fs.try_create("/srv/a.txt"),
            Err(VfsError::TooManyHandles { limit: 1, .. })
        ));
        w.close();
        assert!(fs.try_create("/srv/a.txt").is_ok());
    }

    #[test]
    fn test_handles_share_one_volume() {
        let fs = fs();
        let a = fs.try_create("/srv/a.txt").unwrap();
        let b = fs.try_create("/srv/b.txt").unwrap();
        assert!(Arc::ptr_eq(a.volume(), b.volume()));
        assert!(fs.volume_for("/srv").is_some());

        drop(a);
        drop(b);
        assert!(fs.volume_for("/srv").is_none());
    }

    #[test]
    fn test_recreate_keeps_chain() {
        let fs = fs();
        let mut w = fs.try_create("/srv/a.txt").unwrap();
        w.write(b"0123456789ABCDE");
        w.close();

        let mut w = fs.try_create("/srv/a.txt").unwrap();
        assert_eq!(w.first_cluster(), 0);
        w.write(b"xy");
        w.close();

        let mut r = fs.try_open("/srv/a.txt").unwrap();
        assert_eq!(r.read_vec(15), b"xy23456789ABCDE");
    }

    #[test]
    fn test_rejects_bad_names_and_config() {
        let fs = fs();
        assert!(matches!(
            fs.try_create("/srv/a\nb"),
            Err(VfsError::InvalidName(_))
        ));
        assert!(matches!(
            fs.try_create(""),
            Err(VfsError::InvalidName(_) | VfsError::InvalidPath(_))
        ));
        let config = VfsConfig {
            max_handles: 0,
            ..Default::default()
        };
        assert!(ClusterFs::with_backend(InMemoryBackend::new(), config).is_err());
    }
}
