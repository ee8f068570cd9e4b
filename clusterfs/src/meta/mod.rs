//! Service-file metadata
//!
//! Responsibilities:
//! - Encode and decode the fixed-width text records of the header and the
//!   table so single records can be rewritten in place.
//! - Give typed access to the header's settings block and file rows, and to
//!   the table's cluster links.
//!
//! Submodules:
//! - `codec`: record layouts and sentinels
//! - `header`: settings and per-file rows
//! - `table`: one link record per cluster
//!
//! None of these types lock anything; callers go through the volume locks.
pub mod codec;
pub mod header;
pub mod table;

pub use codec::{FileEntry, OpenMode, Setting, TableEntry};
pub use header::{EntryRow, Header, VfsInfo};
pub use table::Table;
