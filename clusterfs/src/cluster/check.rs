//! Consistency check over the header and the table.
//!
//! Reports problems only; nothing is repaired or reclaimed.

use std::collections::HashSet;
use std::fmt;

use crate::cadapter::ServiceStore;
use crate::cluster::walk_chain;
use crate::error::{Result, VfsError};
use crate::meta::{OpenMode, TableEntry};
use crate::vfs::volume::MetaLock;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Problem {
    /// Chain hits a sentinel other than `END_OF_FILE`, or loops.
    BrokenChain {
        file: String,
        cluster: u64,
        link: TableEntry,
    },
    /// Cluster reachable from two chains.
    SharedCluster { cluster: u64, files: [String; 2] },
    /// Cluster is neither free nor part of any chain.
    Orphan { cluster: u64 },
    /// `FirstEmptyCluster` does not point at a free record.
    FreePointer { cluster: u64, link: TableEntry },
    DuplicateEntry { file: String },
    /// Mode mark set on a file with no open handles.
    StaleMode { file: String },
    /// Open handles recorded without a mode mark.
    MissingMode { file: String },
    TooManyHandles { file: String, count: u32 },
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Problem::BrokenChain {
                file,
                cluster,
                link,
            } => write!(f, "chain of `{file}` breaks at cluster {cluster} ({link})"),
            Problem::SharedCluster { cluster, files } => write!(
                f,
                "cluster {cluster} is shared by `{}` and `{}`",
                files[0], files[1]
            ),
            Problem::Orphan { cluster } => write!(f, "cluster {cluster} is orphaned"),
            Problem::FreePointer { cluster, link } => {
                write!(f, "free list head {cluster} is not free ({link})")
            }
            Problem::DuplicateEntry { file } => write!(f, "`{file}` is registered twice"),
            Problem::StaleMode { file } => write!(f, "`{file}` is closed but keeps a mode mark"),
            Problem::MissingMode { file } => write!(f, "`{file}` is open without a mode mark"),
            Problem::TooManyHandles { file, count } => {
                write!(f, "`{file}` records {count} open handles")
            }
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CheckReport {
    pub table_len: u64,
    pub first_empty_cluster: u64,
    /// `(file name, clusters)` for every intact chain.
    pub chains: Vec<(String, Vec<u64>)>,
    pub free: Vec<u64>,
    pub problems: Vec<Problem>,
}

impl CheckReport {
    pub fn is_consistent(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn collect<S: ServiceStore>(meta: &MetaLock<'_, S>) -> Result<Self> {
        let info = meta.header().read_info()?;
        let entries = meta.header().entries()?;
        let links = meta.table().links()?;
        let max_handles = meta.volume().max_handles();

        let mut report = CheckReport {
            table_len: links.len() as u64,
            first_empty_cluster: info.first_empty_cluster,
            ..Default::default()
        };
        let mut owners: Vec<Option<usize>> = vec![None; links.len()];
        let mut seen = HashSet::new();

        for entry in &entries {
            if !seen.insert(entry.name.as_str()) {
                report.problems.push(Problem::DuplicateEntry {
                    file: entry.name.clone(),
                });
                continue;
            }

            match (entry.open_count, entry.mode) {
                (0, Some(_)) => report.problems.push(Problem::StaleMode {
                    file: entry.name.clone(),
                }),
                (n, None) if n > 0 => report.problems.push(Problem::MissingMode {
                    file: entry.name.clone(),
                }),
                _ => {}
            }
            let limit = match entry.mode {
                Some(OpenMode::WriteOnly) => 1,
                _ => max_handles,
            };
            if entry.open_count > limit {
                report.problems.push(Problem::TooManyHandles {
                    file: entry.name.clone(),
                    count: entry.open_count,
                });
            }

            match walk_chain(&links, entry.first_cluster) {
                Ok(chain) => {
                    let owner = report.chains.len();
                    for &cluster in &chain {
                        match owners[cluster as usize] {
                            Some(other) => report.problems.push(Problem::SharedCluster {
                                cluster,
                                files: [report.chains[other].0.clone(), entry.name.clone()],
                            }),
                            None => owners[cluster as usize] = Some(owner),
                        }
                    }
                    report.chains.push((entry.name.clone(), chain));
                }
                Err(VfsError::ChainCorruption { cluster, link }) => {
                    report.problems.push(Problem::BrokenChain {
                        file: entry.name.clone(),
                        cluster,
                        link,
                    })
                }
                Err(e) => return Err(e),
            }
        }

        for (index, link) in links.iter().enumerate() {
            if *link == TableEntry::Empty {
                report.free.push(index as u64);
            } else if owners[index].is_none() {
                report.problems.push(Problem::Orphan {
                    cluster: index as u64,
                });
            }
        }

        let head = links
            .get(info.first_empty_cluster as usize)
            .copied()
            .unwrap_or(TableEntry::NotFound);
        if head != TableEntry::Empty {
            report.problems.push(Problem::FreePointer {
                cluster: info.first_empty_cluster,
                link: head,
            });
        }

        Ok(report)
    }
}
