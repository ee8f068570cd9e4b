//! VFS layer
//!
//! Responsibilities:
//! - Find or bootstrap the VFS hosting a nominal path (`locator`).
//! - Share one [`Volume`] per root between all of its handles (`fs`,
//!   `volume`).
//! - Keep the per-file open count and mode mark in the header (`session`).
//! - Own a cursor per open session and move bytes through the cluster
//!   engine (`handles`).
//!
//! [`VirtualFs`] is the caller-facing contract. It never returns an error:
//! failures are logged and collapse to `None` or `0`, so callers check
//! return values. [`ClusterFs::try_open`] and [`ClusterFs::try_create`]
//! keep the typed errors for callers that want them.
pub mod fs;
pub mod handles;
pub mod locator;
pub mod session;
pub mod volume;

use std::path::Path;

use tracing::warn;

pub use fs::ClusterFs;
pub use handles::{FileHandle, FileStatus};
pub use volume::Volume;

use crate::cadapter::ServiceBackend;

pub trait VirtualFs {
    type File;

    /// Read-only open of an existing file.
    fn open(&self, path: &Path) -> Option<Self::File>;

    /// Write-only open, creating the file and the VFS when missing.
    fn create(&self, path: &Path) -> Option<Self::File>;

    /// Reads at most `buf.len()` bytes.
    fn read(&self, file: &mut Self::File, buf: &mut [u8]) -> usize;

    fn write(&self, file: &mut Self::File, data: &[u8]) -> usize;

    fn close(&self, file: &mut Self::File);
}

impl<B: ServiceBackend> VirtualFs for ClusterFs<B> {
    type File = FileHandle<B::Store>;

    fn open(&self, path: &Path) -> Option<Self::File> {
        self.try_open(path)
            .inspect_err(|e| warn!(path = %path.display(), error = %e, "open failed"))
            .ok()
    }

    fn create(&self, path: &Path) -> Option<Self::File> {
        self.try_create(path)
            .inspect_err(|e| warn!(path = %path.display(), error = %e, "create failed"))
            .ok()
    }

    fn read(&self, file: &mut Self::File, buf: &mut [u8]) -> usize {
        file.read(buf)
    }

    fn write(&self, file: &mut Self::File, data: &[u8]) -> usize {
        let n = file.write(data);
        if n < data.len() {
            warn!(file = file.name(), written = n, requested = data.len(), "short write");
        }
        n
    }

    fn close(&self, file: &mut Self::File) {
        file.close();
    }
}
