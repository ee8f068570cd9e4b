//! ChainWriter: writes into the data file, growing the chain when the
//! current cluster is the last one and more bytes remain.

use crate::cadapter::{ServiceFile, ServiceStore};
use crate::cluster::{ChainCursor, Stop, Transfer};
use crate::error::{Result, VfsError};
use crate::meta::TableEntry;
use crate::vfs::volume::Volume;

pub struct ChainWriter<'a, S: ServiceStore> {
    volume: &'a Volume<S>,
    cluster_size: u64,
}

impl<'a, S: ServiceStore> ChainWriter<'a, S> {
    pub fn new(volume: &'a Volume<S>, cluster_size: u64) -> Self {
        Self {
            volume,
            cluster_size,
        }
    }

    /// Writes all of `data` starting at `cursor`. Only allocation or I/O
    /// failures stop it short.
    pub fn write(&self, cursor: &mut ChainCursor, data: &[u8]) -> Transfer {
        let mut done = 0;
        match self.drain(cursor, data, &mut done) {
            Ok(()) => Transfer::complete(done),
            Err(e) => Transfer::stopped(done, Stop::Failed(e)),
        }
    }

    fn next_cluster(&self, tail: u64) -> Result<u64> {
        let link = self.volume.lock_table().next_link(tail)?;
        match link {
            TableEntry::Next(next) => Ok(next),
            TableEntry::EndOfFile => self.volume.lock_header().lock_table().grow_chain(tail),
            link => Err(VfsError::ChainCorruption {
                cluster: tail,
                link,
            }),
        }
    }

    fn drain(&self, cursor: &mut ChainCursor, data: &[u8], done: &mut usize) -> Result<()> {
        let cs = self.cluster_size;
        while *done < data.len() {
            if cursor.room(cs) == 0 {
                *cursor = ChainCursor::at(self.next_cluster(cursor.cluster)?);
            }
            let take = (cursor.room(cs) as usize).min(data.len() - *done);
            self.volume.store().write_at(
                ServiceFile::Data,
                cursor.data_offset(cs),
                &data[*done..*done + take],
            )?;
            cursor.offset += take as u64;
            *done += take;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cadapter::memory::InMemoryStore;
    use crate::meta::{Header, Table};

    fn fresh_volume() -> Volume<InMemoryStore> {
        let store = InMemoryStore::new();
        Header::new(&store).format(10).unwrap();
        let table = Table::new(&store);
        table.format().unwrap();
        let vol = Volume::new("/vfs", store, 20);
        {
            let meta = vol.lock_header().lock_table();
            let first = meta.claim_free_cluster().unwrap();
            meta.change_link(first, TableEntry::EndOfFile).unwrap();
        }
        vol
    }

    #[test]
    fn test_full_cluster_does_not_grow_chain() {
        let vol = fresh_volume();
        let writer = ChainWriter::new(&vol, 10);
        let mut cursor = ChainCursor::at(0);
        let t = writer.write(&mut cursor, b"0123456789");
        assert_eq!(t.bytes, 10);
        assert!(t.stop.is_none());
        assert_eq!(vol.chain(0).unwrap(), vec![0]);
        assert_eq!(cursor, ChainCursor { cluster: 0, offset: 10 });

        // one more byte grows the chain exactly once
        let t = writer.write(&mut cursor, b"A");
        assert_eq!(t.bytes, 1);
        assert_eq!(vol.chain(0).unwrap(), vec![0, 1]);
        assert_eq!(
            vol.store().read_all(ServiceFile::Data).unwrap(),
            b"0123456789A"
        );
    }

    #[test]
    fn test_rewrite_follows_existing_chain() {
        let vol = fresh_volume();
        let writer = ChainWriter::new(&vol, 10);
        let mut cursor = ChainCursor::at(0);
        writer.write(&mut cursor, b"0123456789ABCDE");
        let table_len = Table::new(vol.store()).len().unwrap();

        let mut cursor = ChainCursor::at(0);
        let t = writer.write(&mut cursor, b"abcdefghijklm");
        assert_eq!(t.bytes, 13);
        assert_eq!(Table::new(vol.store()).len().unwrap(), table_len);
        assert_eq!(
            vol.store().read_all(ServiceFile::Data).unwrap(),
            b"abcdefghijklmDE"
        );
    }

    #[test]
    fn test_broken_link_stops_write() {
        let vol = fresh_volume();
        Table::new(vol.store())
            .set_link(0, TableEntry::Faulty)
            .unwrap();
        let writer = ChainWriter::new(&vol, 10);
        let mut cursor = ChainCursor::at(0);
        let t = writer.write(&mut cursor, b"0123456789ABC");
        assert_eq!(t.bytes, 10);
        assert!(matches!(
            t.stop,
            Some(Stop::Failed(VfsError::ChainCorruption { cluster: 0, .. }))
        ));
    }

    #[test]
    fn test_link_past_table_stops_write() {
        let vol = fresh_volume();
        Table::new(vol.store())
            .set_link(0, TableEntry::Next(500))
            .unwrap();
        let writer = ChainWriter::new(&vol, 10);
        let mut cursor = ChainCursor::at(0);
        let t = writer.write(&mut cursor, b"0123456789ABCDE");
        assert_eq!(t.bytes, 10);
        assert!(matches!(
            t.stop,
            Some(Stop::Failed(VfsError::ChainCorruption {
                cluster: 0,
                link: TableEntry::NotFound
            }))
        ));
        assert_eq!(vol.store().len(ServiceFile::Data).unwrap(), 10);
        assert_eq!(Table::new(vol.store()).len().unwrap(), 2);
    }
}
