//! Volume: shared state for one VFS root.
//!
//! The header and the table each have their own mutex. Lock guards are typed
//! so the only way to hold both is [`HeaderLock::lock_table`], which keeps
//! the header-before-table order.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::cadapter::ServiceStore;
use crate::cluster::check::CheckReport;
use crate::cluster::walk_chain;
use crate::error::{Result, VfsError};
use crate::meta::{FileEntry, Header, Table, TableEntry, VfsInfo};

pub struct Volume<S: ServiceStore> {
    root: PathBuf,
    store: S,
    header_lock: Mutex<()>,
    table_lock: Mutex<()>,
    max_handles: u32,
}

fn acquire(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    // the mutexes guard no data, a poisoned one is still usable
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<S: ServiceStore> Volume<S> {
    pub fn new(root: impl Into<PathBuf>, store: S, max_handles: u32) -> Self {
        Self {
            root: root.into(),
            store,
            header_lock: Mutex::new(()),
            table_lock: Mutex::new(()),
            max_handles,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn max_handles(&self) -> u32 {
        self.max_handles
    }

    pub fn lock_header(&self) -> HeaderLock<'_, S> {
        HeaderLock {
            volume: self,
            _guard: acquire(&self.header_lock),
        }
    }

    pub fn lock_table(&self) -> TableLock<'_, S> {
        TableLock {
            volume: self,
            _guard: acquire(&self.table_lock),
        }
    }

    pub fn info(&self) -> Result<VfsInfo> {
        self.lock_header().header().read_info()
    }

    /// Registered files in header order.
    pub fn entries(&self) -> Result<Vec<FileEntry>> {
        self.lock_header().header().entries()
    }

    /// Clusters of the chain starting at `first`.
    pub fn chain(&self, first: u64) -> Result<Vec<u64>> {
        self.lock_table().chain(first)
    }

    /// Verifies chains, the free list and session marks.
    pub fn check(&self) -> Result<CheckReport> {
        let meta = self.lock_header().lock_table();
        CheckReport::collect(&meta)
    }
}

/// Holds the header mutex.
pub struct HeaderLock<'a, S: ServiceStore> {
    volume: &'a Volume<S>,
    _guard: MutexGuard<'a, ()>,
}

impl<'a, S: ServiceStore> HeaderLock<'a, S> {
    pub fn volume(&self) -> &'a Volume<S> {
        self.volume
    }

    pub fn header(&self) -> Header<'a, S> {
        Header::new(&self.volume.store)
    }

    /// Takes the table mutex while keeping the header mutex.
    pub fn lock_table(self) -> MetaLock<'a, S> {
        let table = acquire(&self.volume.table_lock);
        MetaLock {
            volume: self.volume,
            _header: self._guard,
            _table: table,
        }
    }
}

/// Holds the table mutex only.
pub struct TableLock<'a, S: ServiceStore> {
    volume: &'a Volume<S>,
    _guard: MutexGuard<'a, ()>,
}

impl<'a, S: ServiceStore> TableLock<'a, S> {
    pub fn table(&self) -> Table<'a, S> {
        Table::new(&self.volume.store)
    }

    /// Link of `cluster` for chain traversal. A target past the end of the
    /// table is corruption.
    pub fn next_link(&self, cluster: u64) -> Result<TableEntry> {
        let table = self.table();
        match table.link(cluster)? {
            TableEntry::Next(next) if next >= table.len()? => Err(VfsError::ChainCorruption {
                cluster,
                link: TableEntry::NotFound,
            }),
            link => Ok(link),
        }
    }

    pub fn chain(&self, first: u64) -> Result<Vec<u64>> {
        walk_chain(&self.table().links()?, first)
    }
}

/// Holds both mutexes, header first.
pub struct MetaLock<'a, S: ServiceStore> {
    volume: &'a Volume<S>,
    _header: MutexGuard<'a, ()>,
    _table: MutexGuard<'a, ()>,
}

impl<'a, S: ServiceStore> MetaLock<'a, S> {
    pub fn volume(&self) -> &'a Volume<S> {
        self.volume
    }

    pub fn header(&self) -> Header<'a, S> {
        Header::new(&self.volume.store)
    }

    pub fn table(&self) -> Table<'a, S> {
        Table::new(&self.volume.store)
    }
}
