//! Finding the VFS root for a nominal path, or bootstrapping a new one.
//!
//! Only the directories above a nominal path are real; the path itself and
//! any "subdirectories" inside the VFS exist only as header row names.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::cadapter::ServiceBackend;
use crate::config::VfsConfig;
use crate::error::{Result, VfsError};
use crate::meta::{Header, Table};

/// Directories above `path`, nearest first. A relative path ends at `.`.
fn parent_dirs(path: &Path) -> impl Iterator<Item = &Path> {
    path.ancestors().skip(1).map(|dir| {
        if dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            dir
        }
    })
}

fn check_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(VfsError::InvalidPath(String::new()));
    }
    Ok(())
}

/// Nearest directory above `path` hosting all three service files.
pub fn locate<B: ServiceBackend>(backend: &B, path: &Path) -> Result<(PathBuf, B::Store)> {
    check_path(path)?;
    for dir in parent_dirs(path) {
        if let Some(store) = backend.probe(dir)? {
            return Ok((dir.to_path_buf(), store));
        }
    }
    Err(VfsError::VfsNotFound(path.to_path_buf()))
}

/// Creates a fresh VFS in the nearest existing directory above `path`:
/// default header, one free cluster, empty data file.
pub fn initialize<B: ServiceBackend>(
    backend: &B,
    path: &Path,
    config: &VfsConfig,
) -> Result<(PathBuf, B::Store)> {
    check_path(path)?;
    config.validate()?;
    let dir = parent_dirs(path)
        .find(|dir| backend.is_dir(dir))
        .ok_or_else(|| VfsError::InvalidPath(path.display().to_string()))?;

    let store = backend.create(dir)?;
    Header::new(&store).format(config.cluster_size)?;
    Table::new(&store).format()?;
    info!(root = %dir.display(), cluster_size = config.cluster_size, "initialized vfs");
    Ok((dir.to_path_buf(), store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cadapter::ServiceFile;
    use crate::cadapter::ServiceStore;
    use crate::cadapter::memory::InMemoryBackend;
    use crate::meta::TableEntry;

    #[test]
    fn test_parent_dirs() {
        let dirs: Vec<_> = parent_dirs(Path::new("/a/b/c.txt")).collect();
        assert_eq!(dirs, [Path::new("/a/b"), Path::new("/a"), Path::new("/")]);
        let dirs: Vec<_> = parent_dirs(Path::new("c.txt")).collect();
        assert_eq!(dirs, [Path::new(".")]);
    }

    #[test]
    fn test_locate_picks_nearest_root() {
        let backend = InMemoryBackend::new().with_dir("/srv/outer/inner");
        assert!(matches!(
            locate(&backend, Path::new("/srv/outer/inner/a.txt")),
            Err(VfsError::VfsNotFound(_))
        ));

        backend.create(Path::new("/srv/outer")).unwrap();
        let (root, _) = locate(&backend, Path::new("/srv/outer/inner/a.txt")).unwrap();
        assert_eq!(root, Path::new("/srv/outer"));

        backend.create(Path::new("/srv/outer/inner")).unwrap();
        let (root, _) = locate(&backend, Path::new("/srv/outer/inner/a.txt")).unwrap();
        assert_eq!(root, Path::new("/srv/outer/inner"));
    }

    #[test]
    fn test_locate_surfaces_unreadable_files() {
        let backend = InMemoryBackend::new().with_dir("/srv");
        backend.create(Path::new("/srv")).unwrap();
        backend.mark_unreadable("/srv");
        assert!(matches!(
            locate(&backend, Path::new("/srv/a.txt")),
            Err(VfsError::ServiceFileUnreadable { .. })
        ));
    }

    #[test]
    fn test_initialize_uses_nearest_existing_dir() {
        let backend = InMemoryBackend::new().with_dir("/srv");
        let config = VfsConfig {
            cluster_size: 8,
            ..Default::default()
        };
        // `virtual/` is not a host directory, only part of the file name
        let (root, store) =
            initialize(&backend, Path::new("/srv/virtual/a.txt"), &config).unwrap();
        assert_eq!(root, Path::new("/srv"));

        let info = Header::new(&store).read_info().unwrap();
        assert_eq!(info.cluster_size, 8);
        assert_eq!(info.first_empty_cluster, 0);
        assert_eq!(Table::new(&store).links().unwrap(), vec![TableEntry::Empty]);
        assert_eq!(store.len(ServiceFile::Data).unwrap(), 0);
    }

    #[test]
    fn test_rejects_empty_path_and_bad_config() {
        let backend = InMemoryBackend::new().with_dir("/srv");
        assert!(matches!(
            locate(&backend, Path::new("")),
            Err(VfsError::InvalidPath(_))
        ));
        let config = VfsConfig {
            cluster_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            initialize(&backend, Path::new("/srv/a.txt"), &config),
            Err(VfsError::InvalidConfig(_))
        ));
        assert!(backend.store(Path::new("/srv")).is_none());
    }
}
