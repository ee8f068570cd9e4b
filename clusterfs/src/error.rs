use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::meta::codec::{OpenMode, TableEntry};

#[derive(Debug, Error)]
pub enum VfsError {
    #[error("no virtual file system found above `{}`", .0.display())]
    VfsNotFound(PathBuf),

    #[error("service file `{}` is unreadable: {source}", .path.display())]
    ServiceFileUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt header: {0}")]
    CorruptHeader(String),

    #[error("file `{0}` is not registered in the header")]
    FileNotFound(String),

    #[error("file `{name}` is already open in {active} mode")]
    ModeConflict { name: String, active: OpenMode },

    #[error("file `{name}` already has {limit} open handles")]
    TooManyHandles { name: String, limit: u32 },

    #[error("cluster {cluster} does not exist, table holds {len} records")]
    Allocation { cluster: u64, len: u64 },

    #[error("chain corrupted at cluster {cluster}: {link}")]
    ChainCorruption { cluster: u64, link: TableEntry },

    #[error("invalid file name `{0}`")]
    InvalidName(String),

    #[error("invalid path `{0}`")]
    InvalidPath(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, VfsError>;
