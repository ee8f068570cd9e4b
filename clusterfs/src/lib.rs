//! ClusterFs: a small virtual file system stored in three host files.
//!
//! `header.dat` lists settings and one row per file, `table.dat` links the
//! clusters of every file into chains, and `data.dat` holds the clusters.

pub mod cadapter;
pub mod cluster;
pub mod config;
pub mod error;
pub mod meta;
pub mod vfs;

pub use config::VfsConfig;
pub use error::{Result, VfsError};
pub use vfs::{ClusterFs, FileHandle, FileStatus, VirtualFs};
