//! Cluster chains
//!
//! Responsibilities:
//! - Keep the free list and thread new clusters onto a file's chain
//!   (`alloc`).
//! - Translate a handle position into `(cluster, offset)` and move bytes
//!   across cluster boundaries (`reader`, `writer`).
//! - Check the table/header invariants without repairing anything (`check`).
//!
//! Cluster `i` occupies bytes `[i * cluster_size, (i + 1) * cluster_size)`
//! of the data file.
pub mod alloc;
pub mod check;
pub mod reader;
pub mod writer;

use crate::error::{Result, VfsError};
use crate::meta::TableEntry;

/// Position inside a chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainCursor {
    pub cluster: u64,
    pub offset: u64,
}

impl ChainCursor {
    pub fn at(cluster: u64) -> Self {
        Self { cluster, offset: 0 }
    }

    /// Byte offset in the data file.
    pub fn data_offset(&self, cluster_size: u64) -> u64 {
        self.cluster * cluster_size + self.offset
    }

    /// Bytes left in the current cluster.
    pub fn room(&self, cluster_size: u64) -> u64 {
        cluster_size.saturating_sub(self.offset)
    }
}

/// Why a read or write stopped short.
#[derive(Debug)]
pub enum Stop {
    EndOfFile,
    Failed(VfsError),
}

/// Outcome of a chain read or write.
#[derive(Debug)]
pub struct Transfer {
    pub bytes: usize,
    pub stop: Option<Stop>,
}

impl Transfer {
    pub fn complete(bytes: usize) -> Self {
        Self { bytes, stop: None }
    }

    pub fn stopped(bytes: usize, stop: Stop) -> Self {
        Self {
            bytes,
            stop: Some(stop),
        }
    }
}

/// Follows links from `first` until `END_OF_FILE`. A chain longer than the
/// table has a cycle.
pub fn walk_chain(links: &[TableEntry], first: u64) -> Result<Vec<u64>> {
    let mut out = Vec::new();
    let mut cluster = first;
    loop {
        let link = links
            .get(cluster as usize)
            .copied()
            .unwrap_or(TableEntry::NotFound);
        if link == TableEntry::NotFound || out.len() >= links.len() {
            return Err(VfsError::ChainCorruption { cluster, link });
        }
        out.push(cluster);
        match link {
            TableEntry::Next(next) => cluster = next,
            TableEntry::EndOfFile => return Ok(out),
            link => return Err(VfsError::ChainCorruption { cluster, link }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TableEntry::*;

    #[test]
    fn test_cursor_offsets() {
        let cursor = ChainCursor {
            cluster: 3,
            offset: 4,
        };
        assert_eq!(cursor.data_offset(10), 34);
        assert_eq!(cursor.room(10), 6);
        assert_eq!(ChainCursor::at(2).data_offset(10), 20);
    }

    #[test]
    fn test_walk_chain() {
        let links = [Next(2), Empty, Next(3), EndOfFile];
        assert_eq!(walk_chain(&links, 0).unwrap(), vec![0, 2, 3]);
        assert_eq!(walk_chain(&links, 3).unwrap(), vec![3]);
    }

    #[test]
    fn test_walk_chain_detects_cycle_and_faults() {
        let cyclic = [Next(1), Next(0)];
        assert!(matches!(
            walk_chain(&cyclic, 0),
            Err(VfsError::ChainCorruption { .. })
        ));

        let broken = [Next(1), Empty];
        assert!(matches!(
            walk_chain(&broken, 0),
            Err(VfsError::ChainCorruption {
                cluster: 1,
                link: Empty
            })
        ));

        let dangling = [Next(7)];
        assert!(matches!(
            walk_chain(&dangling, 0),
            Err(VfsError::ChainCorruption {
                cluster: 7,
                link: NotFound
            })
        ));
    }
}
