//! Table file: record `i` holds the link stored for cluster `i`.

use crate::cadapter::{ServiceFile, ServiceStore};
use crate::error::{Result, VfsError};
use crate::meta::codec::{TABLE_RECORD_WIDTH, TableEntry, decode_record, encode_record};

pub struct Table<'a, S: ServiceStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: ServiceStore + ?Sized> Table<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Replaces the table with a single free cluster.
    pub fn format(&self) -> Result<()> {
        self.store.reset(ServiceFile::Table)?;
        self.push(TableEntry::Empty)?;
        Ok(())
    }

    /// Number of complete records.
    pub fn len(&self) -> Result<u64> {
        Ok(self.store.len(ServiceFile::Table)? / TABLE_RECORD_WIDTH)
    }

    /// Link of `cluster`, or [`TableEntry::NotFound`] past the end.
    pub fn link(&self, cluster: u64) -> Result<TableEntry> {
        let mut buf = [0u8; TABLE_RECORD_WIDTH as usize];
        let n = self
            .store
            .read_at(ServiceFile::Table, cluster * TABLE_RECORD_WIDTH, &mut buf)?;
        if n < buf.len() {
            return Ok(TableEntry::NotFound);
        }
        Ok(decode_record(&buf))
    }

    /// Overwrites the link of an existing cluster.
    pub fn set_link(&self, cluster: u64, entry: TableEntry) -> Result<()> {
        let len = self.len()?;
        if cluster >= len {
            return Err(VfsError::Allocation { cluster, len });
        }
        self.store.write_at(
            ServiceFile::Table,
            cluster * TABLE_RECORD_WIDTH,
            encode_record(entry).as_bytes(),
        )?;
        Ok(())
    }

    /// Appends a record and returns its cluster index.
    pub fn push(&self, entry: TableEntry) -> Result<u64> {
        let index = self.len()?;
        self.store.write_at(
            ServiceFile::Table,
            index * TABLE_RECORD_WIDTH,
            encode_record(entry).as_bytes(),
        )?;
        Ok(index)
    }

    /// Every record, decoded in one read.
    pub fn links(&self) -> Result<Vec<TableEntry>> {
        let buf = self.store.read_all(ServiceFile::Table)?;
        Ok(buf
            .chunks_exact(TABLE_RECORD_WIDTH as usize)
            .map(decode_record)
            .collect())
    }
}
