//! Header file: a settings block terminated by `-----`, followed by one
//! fixed-tail row per registered file.

use tracing::warn;

use crate::cadapter::{ServiceFile, ServiceStore};
use crate::error::{Result, VfsError};
use crate::meta::codec::{
    self, FileEntry, INFO_END, RowTail, Setting, decode_row_tail, encode_row, encode_row_tail,
    encode_setting, split_row,
};

/// Settings of a VFS, validated on read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VfsInfo {
    pub cluster_size: u64,
    pub first_empty_cluster: u64,
}

/// A file row together with its byte offset in the header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryRow {
    pub offset: u64,
    pub entry: FileEntry,
}

pub struct Header<'a, S: ServiceStore + ?Sized> {
    store: &'a S,
}

/// Splits `buf` into `(offset, line)` pairs, newline stripped.
fn lines(buf: &[u8]) -> impl Iterator<Item = (u64, &[u8])> {
    let mut offset = 0u64;
    buf.split_inclusive(|b| *b == b'\n').map(move |raw| {
        let at = offset;
        offset += raw.len() as u64;
        let line = raw.strip_suffix(b"\n").unwrap_or(raw);
        (at, line)
    })
}

fn is_info_end(line: &[u8]) -> bool {
    line.trim_ascii() == INFO_END.as_bytes()
}

impl<'a, S: ServiceStore + ?Sized> Header<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Replaces the whole header with a fresh settings block and no rows.
    pub fn format(&self, cluster_size: u64) -> Result<()> {
        let mut block = encode_setting(Setting::ClusterSize, cluster_size as i64);
        block.push_str(&encode_setting(Setting::FirstEmptyCluster, 0));
        block.push_str(INFO_END);
        block.push('\n');
        self.store.reset(ServiceFile::Header)?;
        self.store.write_at(ServiceFile::Header, 0, block.as_bytes())?;
        Ok(())
    }

    /// Reads the settings block. Settings may appear in any order.
    pub fn read_info(&self) -> Result<VfsInfo> {
        let buf = self.store.read_all(ServiceFile::Header)?;
        let mut cluster_size = -1i64;
        let mut first_empty = -1i64;
        let mut terminated = false;

        for (_, line) in lines(&buf) {
            if is_info_end(line) {
                terminated = true;
                break;
            }
            let Ok(text) = std::str::from_utf8(line) else {
                continue;
            };
            match Setting::parse_line(text) {
                Some((Setting::ClusterSize, v)) => cluster_size = v,
                Some((Setting::FirstEmptyCluster, v)) => first_empty = v,
                None => {}
            }
        }

        if !terminated {
            return Err(VfsError::CorruptHeader(format!(
                "settings block is not terminated by `{INFO_END}`"
            )));
        }
        if cluster_size <= 0 || first_empty < 0 {
            return Err(VfsError::CorruptHeader(format!(
                "invalid settings: cluster size {cluster_size}, first empty cluster {first_empty}"
            )));
        }
        Ok(VfsInfo {
            cluster_size: cluster_size as u64,
            first_empty_cluster: first_empty as u64,
        })
    }

    /// Rewrites one setting in place.
    pub fn write_setting(&self, setting: Setting, value: i64) -> Result<()> {
        let buf = self.store.read_all(ServiceFile::Header)?;
        let encoded = encode_setting(setting, value);

        for (offset, line) in lines(&buf) {
            if is_info_end(line) {
                break;
            }
            let Some((found, _)) = std::str::from_utf8(line).ok().and_then(Setting::parse_line)
            else {
                continue;
            };
            if found != setting {
                continue;
            }
            if line.len() + 1 != encoded.len() {
                return Err(VfsError::CorruptHeader(format!(
                    "setting line `{}` is not fixed width",
                    String::from_utf8_lossy(line)
                )));
            }
            self.store
                .write_at(ServiceFile::Header, offset, encoded.as_bytes())?;
            return Ok(());
        }

        Err(VfsError::CorruptHeader(format!(
            "setting `{}` is missing",
            setting.mark().trim_end_matches([' ', '='])
        )))
    }

    /// Visits every row after the settings block.
    fn rows(buf: &[u8]) -> impl Iterator<Item = (u64, &[u8])> {
        lines(buf)
            .skip_while(|(_, line)| !is_info_end(line))
            .skip(1)
            .filter(|(_, line)| !line.is_empty())
    }

    pub fn find_entry(&self, name: &str) -> Result<Option<EntryRow>> {
        let buf = self.store.read_all(ServiceFile::Header)?;
        for (offset, line) in Self::rows(&buf) {
            let Some((row_name, tail)) = split_row(line) else {
                continue;
            };
            if row_name != name.as_bytes() {
                continue;
            }
            let tail = decode_row_tail(tail).ok_or_else(|| {
                VfsError::CorruptHeader(format!("malformed row for `{name}`"))
            })?;
            return Ok(Some(EntryRow {
                offset,
                entry: FileEntry {
                    name: name.to_string(),
                    first_cluster: tail.first_cluster,
                    mode: tail.mode,
                    open_count: tail.open_count,
                },
            }));
        }
        Ok(None)
    }

    /// All decodable rows, in registration order. Malformed rows are skipped.
    pub fn entries(&self) -> Result<Vec<FileEntry>> {
        let buf = self.store.read_all(ServiceFile::Header)?;
        let mut out = Vec::new();
        for (offset, line) in Self::rows(&buf) {
            let decoded = split_row(line).and_then(|(name, tail)| {
                let tail = decode_row_tail(tail)?;
                let name = std::str::from_utf8(name).ok()?;
                Some(FileEntry {
                    name: name.to_string(),
                    first_cluster: tail.first_cluster,
                    mode: tail.mode,
                    open_count: tail.open_count,
                })
            });
            match decoded {
                Some(entry) => out.push(entry),
                None => warn!(offset, "skipping malformed header row"),
            }
        }
        Ok(out)
    }

    pub fn append_entry(&self, entry: &FileEntry) -> Result<EntryRow> {
        if !codec::is_valid_name(&entry.name) {
            return Err(VfsError::InvalidName(entry.name.clone()));
        }
        let offset = self
            .store
            .append(ServiceFile::Header, encode_row(entry).as_bytes())?;
        Ok(EntryRow {
            offset,
            entry: entry.clone(),
        })
    }

    /// Rewrites the fixed-width tail of an existing row.
    pub fn rewrite_entry(&self, row: &EntryRow) -> Result<()> {
        let tail = encode_row_tail(RowTail {
            first_cluster: row.entry.first_cluster,
            mode: row.entry.mode,
            open_count: row.entry.open_count,
        });
        let at = row.offset + row.entry.name.len() as u64;
        self.store
            .write_at(ServiceFile::Header, at, tail.as_bytes())?;
        Ok(())
    }
}
