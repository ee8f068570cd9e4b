//! Open/close bookkeeping kept in the header rows.
//!
//! A row with `open_count == 0` is unopened and carries no mode mark. While
//! handles are live, all of them share the recorded mode: up to the volume's
//! handle limit of readers, or exactly one writer.

use tracing::debug;

use crate::cadapter::ServiceStore;
use crate::error::{Result, VfsError};
use crate::meta::codec::is_valid_name;
use crate::meta::{FileEntry, OpenMode, TableEntry};
use crate::vfs::volume::{HeaderLock, MetaLock};

impl<S: ServiceStore> HeaderLock<'_, S> {
    /// Registers one more handle on an existing file and returns its first
    /// cluster.
    pub fn open_for(&self, name: &str, mode: OpenMode) -> Result<u64> {
        let header = self.header();
        let mut row = header
            .find_entry(name)?
            .ok_or_else(|| VfsError::FileNotFound(name.to_string()))?;

        match row.entry.mode {
            Some(active) if row.entry.open_count > 0 && active != mode => {
                return Err(VfsError::ModeConflict {
                    name: name.to_string(),
                    active,
                });
            }
            _ => {}
        }
        let limit = match mode {
            OpenMode::ReadOnly => self.volume().max_handles(),
            OpenMode::WriteOnly => 1,
        };
        if row.entry.open_count >= limit {
            return Err(VfsError::TooManyHandles {
                name: name.to_string(),
                limit,
            });
        }

        row.entry.open_count += 1;
        row.entry.mode = Some(mode);
        header.rewrite_entry(&row)?;
        debug!(name, %mode, count = row.entry.open_count, "opened file");
        Ok(row.entry.first_cluster)
    }

    /// Releases one handle. The last release blanks the mode mark; the row
    /// and its chain stay.
    pub fn close_for(&self, name: &str) -> Result<()> {
        let header = self.header();
        let mut row = header
            .find_entry(name)?
            .ok_or_else(|| VfsError::FileNotFound(name.to_string()))?;

        row.entry.open_count = row.entry.open_count.saturating_sub(1);
        if row.entry.open_count == 0 {
            row.entry.mode = None;
        }
        header.rewrite_entry(&row)?;
        debug!(name, count = row.entry.open_count, "closed file");
        Ok(())
    }
}

impl<S: ServiceStore> MetaLock<'_, S> {
    /// Adds a row for a new file owning a single fresh cluster, with one
    /// handle already open in `mode`.
    pub fn register_new_file(&self, name: &str, mode: OpenMode) -> Result<u64> {
        if !is_valid_name(name) {
            return Err(VfsError::InvalidName(name.to_string()));
        }
        let first = self.claim_free_cluster()?;
        self.change_link(first, TableEntry::EndOfFile)?;
        self.header().append_entry(&FileEntry {
            name: name.to_string(),
            first_cluster: first,
            mode: Some(mode),
            open_count: 1,
        })?;
        debug!(name, cluster = first, "registered file");
        Ok(first)
    }
}
