//! ChainReader: reads from the data file while following a file's chain.

use crate::cadapter::{ServiceFile, ServiceStore};
use crate::cluster::{ChainCursor, Stop, Transfer};
use crate::error::{Result, VfsError};
use crate::meta::TableEntry;
use crate::vfs::volume::Volume;

pub struct ChainReader<'a, S: ServiceStore> {
    volume: &'a Volume<S>,
    cluster_size: u64,
}

impl<'a, S: ServiceStore> ChainReader<'a, S> {
    pub fn new(volume: &'a Volume<S>, cluster_size: u64) -> Self {
        Self {
            volume,
            cluster_size,
        }
    }

    /// Fills `buf` starting at `cursor`, never reading more than requested.
    ///
    /// Stops with [`Stop::EndOfFile`] when the chain ends or the data file
    /// runs out, and with [`Stop::Failed`] on a broken link or I/O error.
    pub fn read(&self, cursor: &mut ChainCursor, buf: &mut [u8]) -> Transfer {
        let mut done = 0;
        match self.fill(cursor, buf, &mut done) {
            Ok(true) => Transfer::complete(done),
            Ok(false) => Transfer::stopped(done, Stop::EndOfFile),
            Err(e) => Transfer::stopped(done, Stop::Failed(e)),
        }
    }

    fn fill(&self, cursor: &mut ChainCursor, buf: &mut [u8], done: &mut usize) -> Result<bool> {
        let cs = self.cluster_size;
        while *done < buf.len() {
            if cursor.room(cs) == 0 {
                let link = self.volume.lock_table().next_link(cursor.cluster)?;
                match link {
                    TableEntry::Next(next) => *cursor = ChainCursor::at(next),
                    TableEntry::EndOfFile => return Ok(false),
                    link => {
                        return Err(VfsError::ChainCorruption {
                            cluster: cursor.cluster,
                            link,
                        });
                    }
                }
            }

            let want = (cursor.room(cs) as usize).min(buf.len() - *done);
            let n = self.volume.store().read_at(
                ServiceFile::Data,
                cursor.data_offset(cs),
                &mut buf[*done..*done + want],
            )?;
            cursor.offset += n as u64;
            *done += n;
            if n < want {
                // data file ends inside the last written cluster
                return Ok(false);
            }
        }
        Ok(true)
    }
}
