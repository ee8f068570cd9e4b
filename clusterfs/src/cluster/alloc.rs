//! Free-cluster allocation.
//!
//! Every free cluster holds `EMPTY`; the header's `FirstEmptyCluster` points
//! at the head. When no free record exists past the head, the table grows by
//! one `EMPTY` record, so the table length is the only capacity bound.
//!
//! All operations run under [`MetaLock`] so a scan-then-append sequence can
//! never interleave with another thread's.

use tracing::debug;

use crate::cadapter::ServiceStore;
use crate::error::{Result, VfsError};
use crate::meta::{Setting, TableEntry};
use crate::vfs::volume::MetaLock;

impl<S: ServiceStore> MetaLock<'_, S> {
    /// First `EMPTY` record after `from`, appending one if there is none.
    pub fn find_free_cluster(&self, from: u64) -> Result<u64> {
        let table = self.table();
        let links = table.links()?;
        let start = from.saturating_add(1) as usize;
        if let Some(pos) = links
            .iter()
            .skip(start)
            .position(|link| *link == TableEntry::Empty)
        {
            return Ok((start + pos) as u64);
        }
        let index = table.push(TableEntry::Empty)?;
        debug!(cluster = index, "extended free list");
        Ok(index)
    }

    pub fn change_link(&self, cluster: u64, link: TableEntry) -> Result<()> {
        self.table().set_link(cluster, link)
    }

    /// Takes the head of the free list and advances the header pointer.
    ///
    /// The pointer is persisted before the caller links the claimed cluster,
    /// so the head never names a cluster that is already part of a chain.
    pub fn claim_free_cluster(&self) -> Result<u64> {
        let info = self.header().read_info()?;
        let claimed = info.first_empty_cluster;
        match self.table().link(claimed)? {
            TableEntry::Empty => {}
            link => {
                return Err(VfsError::ChainCorruption {
                    cluster: claimed,
                    link,
                });
            }
        }
        let next = self.find_free_cluster(claimed)?;
        self.header()
            .write_setting(Setting::FirstEmptyCluster, next as i64)?;
        debug!(claimed, next_free = next, "claimed free cluster");
        Ok(claimed)
    }

    /// Appends a cluster after `tail` and returns it.
    ///
    /// If `tail` already links somewhere, that cluster is returned instead.
    pub fn grow_chain(&self, tail: u64) -> Result<u64> {
        let table = self.table();
        match table.link(tail)? {
            TableEntry::EndOfFile => {}
            TableEntry::Next(next) if next < table.len()? => return Ok(next),
            TableEntry::Next(_) => {
                return Err(VfsError::ChainCorruption {
                    cluster: tail,
                    link: TableEntry::NotFound,
                });
            }
            link => {
                return Err(VfsError::ChainCorruption {
                    cluster: tail,
                    link,
                });
            }
        }
        let fresh = self.claim_free_cluster()?;
        self.change_link(tail, TableEntry::Next(fresh))?;
        self.change_link(fresh, TableEntry::EndOfFile)?;
        debug!(tail, cluster = fresh, "grew chain");
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use crate::cadapter::memory::InMemoryStore;
    use crate::meta::{Header, Table, TableEntry};
    use crate::vfs::volume::Volume;
    use TableEntry::*;

    fn volume() -> Volume<InMemoryStore> {
        let store = InMemoryStore::new();
        Header::new(&store).format(10).unwrap();
        Table::new(&store).format().unwrap();
        Volume::new("/vfs", store, 20)
    }

    #[test]
    fn test_find_free_cluster_skips_to_next_empty() {
        let vol = volume();
        let meta = vol.lock_header().lock_table();
        let table = meta.table();
        table.push(EndOfFile).unwrap();
        table.push(Empty).unwrap();

        assert_eq!(meta.find_free_cluster(0).unwrap(), 2);
        assert_eq!(table.len().unwrap(), 3);
    }

    #[test]
    fn test_find_free_cluster_extends_table() {
        let vol = volume();
        let meta = vol.lock_header().lock_table();
        assert_eq!(meta.find_free_cluster(0).unwrap(), 1);
        assert_eq!(meta.table().links().unwrap(), vec![Empty, Empty]);
    }

    #[test]
    fn test_claim_advances_pointer_and_keeps_tail_free() {
        let vol = volume();
        let meta = vol.lock_header().lock_table();

        assert_eq!(meta.claim_free_cluster().unwrap(), 0);
        assert_eq!(meta.header().read_info().unwrap().first_empty_cluster, 1);
        meta.change_link(0, EndOfFile).unwrap();

        assert_eq!(meta.claim_free_cluster().unwrap(), 1);
        assert_eq!(meta.header().read_info().unwrap().first_empty_cluster, 2);
        assert_eq!(meta.table().link(2).unwrap(), Empty);
    }

    #[test]
    fn test_grow_chain_links_tail() {
        let vol = volume();
        let meta = vol.lock_header().lock_table();
        let first = meta.claim_free_cluster().unwrap();
        meta.change_link(first, EndOfFile).unwrap();

        let second = meta.grow_chain(first).unwrap();
        assert_eq!(second, 1);
        assert_eq!(
            meta.table().links().unwrap(),
            vec![Next(1), EndOfFile, Empty]
        );
        assert_eq!(meta.header().read_info().unwrap().first_empty_cluster, 2);

        // already linked: no new allocation
        assert_eq!(meta.grow_chain(first).unwrap(), 1);
        assert_eq!(meta.table().len().unwrap(), 3);
    }

    #[test]
    fn test_grow_chain_rejects_link_past_table() {
        let vol = volume();
        let meta = vol.lock_header().lock_table();
        meta.change_link(0, Next(9)).unwrap();
        assert!(matches!(
            meta.grow_chain(0),
            Err(crate::error::VfsError::ChainCorruption {
                cluster: 0,
                link: NotFound
            })
        ));
        assert_eq!(meta.table().len().unwrap(), 1);
    }

    #[test]
    fn test_claim_rejects_pointer_to_used_cluster() {
        let vol = volume();
        let meta = vol.lock_header().lock_table();
        meta.change_link(0, EndOfFile).unwrap();
        assert!(matches!(
            meta.claim_free_cluster(),
            Err(crate::error::VfsError::ChainCorruption { cluster: 0, .. })
        ));
    }

    #[test]
    fn test_change_link_past_end_is_allocation_error() {
        let vol = volume();
        let meta = vol.lock_header().lock_table();
        assert!(matches!(
            meta.change_link(4, EndOfFile),
            Err(crate::error::VfsError::Allocation { cluster: 4, len: 1 })
        ));
    }
}
