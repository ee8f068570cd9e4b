//! File handles: one open session on one file.
//!
//! A handle owns its cursor and status; the chain and header row it points
//! into are shared through the [`Volume`].

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use crate::cadapter::ServiceStore;
use crate::cluster::reader::ChainReader;
use crate::cluster::writer::ChainWriter;
use crate::cluster::{ChainCursor, Stop, Transfer};
use crate::meta::OpenMode;
use crate::vfs::volume::Volume;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileStatus {
    ReadOnly,
    WriteOnly,
    Closed,
    /// A read ran past the last byte of the chain.
    EndOfFile,
    /// A broken link or I/O failure; nothing more moves until close.
    Bad,
}

impl From<OpenMode> for FileStatus {
    fn from(mode: OpenMode) -> Self {
        match mode {
            OpenMode::ReadOnly => FileStatus::ReadOnly,
            OpenMode::WriteOnly => FileStatus::WriteOnly,
        }
    }
}

pub struct FileHandle<S: ServiceStore> {
    volume: Arc<Volume<S>>,
    name: String,
    first_cluster: u64,
    cluster_size: u64,
    cursor: ChainCursor,
    status: FileStatus,
    /// Whether the header row still counts this handle.
    registered: bool,
}

impl<S: ServiceStore> FileHandle<S> {
    /// Wraps a session already registered in the header.
    pub(crate) fn new(
        volume: Arc<Volume<S>>,
        name: impl Into<String>,
        first_cluster: u64,
        cluster_size: u64,
        mode: OpenMode,
    ) -> Self {
        Self {
            volume,
            name: name.into(),
            first_cluster,
            cluster_size,
            cursor: ChainCursor::at(first_cluster),
            status: mode.into(),
            registered: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> FileStatus {
        self.status
    }

    pub fn first_cluster(&self) -> u64 {
        self.first_cluster
    }

    pub fn cluster_size(&self) -> u64 {
        self.cluster_size
    }

    /// Current `(cluster, offset)` inside the chain.
    pub fn position(&self) -> ChainCursor {
        self.cursor
    }

    pub fn root(&self) -> &Path {
        self.volume.root()
    }

    pub fn volume(&self) -> &Arc<Volume<S>> {
        &self.volume
    }

    pub fn is_open(&self) -> bool {
        self.status != FileStatus::Closed
    }

    /// Reads up to `buf.len()` bytes. Returns 0 unless the handle is
    /// read-only; a short count means the chain ended or broke.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        if self.status != FileStatus::ReadOnly {
            return 0;
        }
        let transfer =
            ChainReader::new(&self.volume, self.cluster_size).read(&mut self.cursor, buf);
        self.settle(transfer)
    }

    /// Reads up to `max_len` bytes into a fresh buffer.
    pub fn read_vec(&mut self, max_len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; max_len];
        let n = self.read(&mut buf);
        buf.truncate(n);
        buf
    }

    /// Writes `data`, growing the chain as needed. Returns 0 unless the
    /// handle is write-only.
    pub fn write(&mut self, data: &[u8]) -> usize {
        if self.status != FileStatus::WriteOnly {
            return 0;
        }
        let transfer =
            ChainWriter::new(&self.volume, self.cluster_size).write(&mut self.cursor, data);
        self.settle(transfer)
    }

    fn settle(&mut self, transfer: Transfer) -> usize {
        match transfer.stop {
            None => {}
            Some(Stop::EndOfFile) => self.status = FileStatus::EndOfFile,
            Some(Stop::Failed(e)) => {
                warn!(
                    file = %self.name,
                    cluster = self.cursor.cluster,
                    error = %e,
                    "handle is bad"
                );
                self.status = FileStatus::Bad;
            }
        }
        transfer.bytes
    }

    /// Ends the session. Calling it again is a no-op.
    pub fn close(&mut self) {
        if !self.registered {
            return;
        }
        self.registered = false;
        self.cursor = ChainCursor::at(self.first_cluster);
        self.status = FileStatus::Closed;
        if let Err(e) = self.volume.lock_header().close_for(&self.name) {
            warn!(file = %self.name, error = %e, "failed to release session");
        }
    }
}

impl<S: ServiceStore> Drop for FileHandle<S> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<S: ServiceStore> fmt::Debug for FileHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("root", &self.volume.root())
            .field("name", &self.name)
            .field("cursor", &self.cursor)
            .field("status", &self.status)
            .finish()
    }
}
