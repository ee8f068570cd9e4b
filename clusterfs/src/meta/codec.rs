//! Fixed-width text codec for the header and table service files.
//!
//! Every numeric field is written as a sign followed by 16 zero-padded digits,
//! so a record can always be rewritten in place without shifting the bytes
//! that follow it.

use std::fmt;

/// Digits in a numeric field, excluding the sign.
pub const MAX_DIGITS: usize = 16;
/// Width of an encoded numeric field (sign + digits).
pub const NUMBER_WIDTH: usize = MAX_DIGITS + 1;
/// One table record: numeric field plus newline.
pub const TABLE_RECORD_WIDTH: u64 = NUMBER_WIDTH as u64 + 1;
/// Width of the mode mark field in a file row.
pub const MODE_WIDTH: usize = 4;
/// Width of the open-count field in a file row.
pub const COUNT_WIDTH: usize = 2;
/// Fixed tail of a file row after the name: ` <num> <mode> <count>`.
pub const ROW_TAIL_WIDTH: usize = 1 + NUMBER_WIDTH + 1 + MODE_WIDTH + 1 + COUNT_WIDTH;
/// Marks the end of the settings block in the header.
pub const INFO_END: &str = "-----";

/// Largest magnitude a numeric field can hold.
pub const MAX_NUMBER: i64 = 9_999_999_999_999_999;

const EMPTY: i64 = -1;
const END_OF_FILE: i64 = -2;
const FAULTY: i64 = -3;
const NOT_FOUND: i64 = -4;

/// Decoded value of one table record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableEntry {
    /// Index of the next cluster in the owning chain.
    Next(u64),
    /// Cluster is free.
    Empty,
    /// Last cluster of a chain.
    EndOfFile,
    /// Record could not be decoded.
    Faulty,
    /// Requested index lies outside the table. Never persisted.
    NotFound,
}

impl TableEntry {
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            EMPTY => TableEntry::Empty,
            END_OF_FILE => TableEntry::EndOfFile,
            NOT_FOUND => TableEntry::NotFound,
            n if n >= 0 => TableEntry::Next(n as u64),
            _ => TableEntry::Faulty,
        }
    }

    pub fn to_raw(self) -> i64 {
        match self {
            TableEntry::Next(n) => n as i64,
            TableEntry::Empty => EMPTY,
            TableEntry::EndOfFile => END_OF_FILE,
            TableEntry::Faulty => FAULTY,
            TableEntry::NotFound => NOT_FOUND,
        }
    }

    /// True for the sentinels that signal a broken chain.
    pub fn is_fault(self) -> bool {
        matches!(self, TableEntry::Faulty | TableEntry::NotFound)
    }
}

impl fmt::Display for TableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableEntry::Next(n) => write!(f, "next={n}"),
            TableEntry::Empty => f.write_str("EMPTY"),
            TableEntry::EndOfFile => f.write_str("END_OF_FILE"),
            TableEntry::Faulty => f.write_str("FAULTY"),
            TableEntry::NotFound => f.write_str("NOT_FOUND"),
        }
    }
}

/// Persisted mode mark of an open file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpenMode {
    ReadOnly,
    WriteOnly,
}

impl OpenMode {
    pub fn mark(self) -> &'static str {
        match self {
            OpenMode::ReadOnly => "RO",
            OpenMode::WriteOnly => "WO",
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mark())
    }
}

/// Named values in the header's settings block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Setting {
    ClusterSize,
    FirstEmptyCluster,
}

impl Setting {
    pub fn mark(self) -> &'static str {
        match self {
            Setting::ClusterSize => "ClusterSize = ",
            Setting::FirstEmptyCluster => "FirstEmptyCluster = ",
        }
    }

    /// Matches a settings line, ignoring surrounding whitespace around `=`.
    pub fn parse_line(line: &str) -> Option<(Setting, i64)> {
        let (key, value) = line.split_once('=')?;
        let setting = match key.trim() {
            "ClusterSize" => Setting::ClusterSize,
            "FirstEmptyCluster" => Setting::FirstEmptyCluster,
            _ => return None,
        };
        Some((setting, decode_number(value.as_bytes()).unwrap_or(-1)))
    }
}

/// Metadata row for one nominal file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub first_cluster: u64,
    pub mode: Option<OpenMode>,
    pub open_count: u32,
}

impl FileEntry {
    pub fn new(name: impl Into<String>, first_cluster: u64) -> Self {
        Self {
            name: name.into(),
            first_cluster,
            mode: None,
            open_count: 0,
        }
    }
}

/// The fixed-width part of a file row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowTail {
    pub first_cluster: u64,
    pub mode: Option<OpenMode>,
    pub open_count: u32,
}

pub fn encode_number(value: i64) -> String {
    debug_assert!(value.abs() <= MAX_NUMBER, "value exceeds field width");
    format!("{value:+0width$}", width = NUMBER_WIDTH)
}

/// Decodes a numeric field. Surrounding whitespace is ignored.
pub fn decode_number(raw: &[u8]) -> Option<i64> {
    std::str::from_utf8(raw).ok()?.trim().parse().ok()
}

pub fn encode_record(entry: TableEntry) -> String {
    let mut out = encode_number(entry.to_raw());
    out.push('\n');
    out
}

/// Malformed records decode to [`TableEntry::Faulty`].
pub fn decode_record(raw: &[u8]) -> TableEntry {
    match decode_number(raw) {
        Some(n) => TableEntry::from_raw(n),
        None => TableEntry::Faulty,
    }
}

pub fn encode_setting(setting: Setting, value: i64) -> String {
    format!("{}{}\n", setting.mark(), encode_number(value))
}

pub fn encode_row_tail(tail: RowTail) -> String {
    let mode = tail.mode.map(OpenMode::mark).unwrap_or("");
    format!(
        " {} {:<mode_w$} {:0count_w$}",
        encode_number(tail.first_cluster as i64),
        mode,
        tail.open_count,
        mode_w = MODE_WIDTH,
        count_w = COUNT_WIDTH,
    )
}

pub fn encode_row(entry: &FileEntry) -> String {
    let tail = encode_row_tail(RowTail {
        first_cluster: entry.first_cluster,
        mode: entry.mode,
        open_count: entry.open_count,
    });
    format!("{}{}\n", entry.name, tail)
}

/// Splits a row (without its newline) into name bytes and tail bytes.
pub fn split_row(line: &[u8]) -> Option<(&[u8], &[u8])> {
    if line.len() <= ROW_TAIL_WIDTH {
        return None;
    }
    Some(line.split_at(line.len() - ROW_TAIL_WIDTH))
}

pub fn decode_row_tail(tail: &[u8]) -> Option<RowTail> {
    if tail.len() != ROW_TAIL_WIDTH || tail[0] != b' ' {
        return None;
    }
    let num_end = 1 + NUMBER_WIDTH;
    let mode_start = num_end + 1;
    let count_start = mode_start + MODE_WIDTH + 1;
    if tail[num_end] != b' ' || tail[count_start - 1] != b' ' {
        return None;
    }

    let first_cluster = decode_number(&tail[1..num_end]).filter(|n| *n >= 0)? as u64;
    let mode = match std::str::from_utf8(&tail[mode_start..mode_start + MODE_WIDTH])
        .ok()?
        .trim()
    {
        "" => None,
        "RO" => Some(OpenMode::ReadOnly),
        "WO" => Some(OpenMode::WriteOnly),
        _ => return None,
    };
    let count = &tail[count_start..];
    if !count.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let open_count = std::str::from_utf8(count).ok()?.parse().ok()?;

    Some(RowTail {
        first_cluster,
        mode,
        open_count,
    })
}

/// Names become the row key and cannot contain line breaks.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['\n', '\r']) && name != INFO_END
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_is_fixed_width_and_sign_aware() {
        assert_eq!(encode_number(10), "+0000000000000010");
        assert_eq!(encode_number(-2), "-0000000000000002");
        assert_eq!(encode_number(0).len(), NUMBER_WIDTH);
        assert_eq!(encode_number(MAX_NUMBER).len(), NUMBER_WIDTH);
        assert_eq!(decode_number(b"+0000000000000010"), Some(10));
        assert_eq!(decode_number(b"  -0000000000000001\n"), Some(-1));
    }

    #[test]
    fn test_record_sentinels() {
        assert_eq!(encode_record(TableEntry::Empty), "-0000000000000001\n");
        assert_eq!(
            encode_record(TableEntry::EndOfFile).len() as u64,
            TABLE_RECORD_WIDTH
        );
        assert_eq!(decode_record(b"+0000000000000007\n"), TableEntry::Next(7));
        assert_eq!(decode_record(b"-0000000000000002\n"), TableEntry::EndOfFile);
        assert_eq!(decode_record(b"-0000000000000003\n"), TableEntry::Faulty);
        assert_eq!(decode_record(b"-0000000000000004\n"), TableEntry::NotFound);
    }

    #[test]
    fn test_malformed_record_is_faulty() {
        assert_eq!(decode_record(b"+00000000garbage\n"), TableEntry::Faulty);
        assert_eq!(decode_record(b""), TableEntry::Faulty);
        assert_eq!(decode_record(b"-0000000000000009\n"), TableEntry::Faulty);
    }

    #[test]
    fn test_setting_line() {
        let line = encode_setting(Setting::FirstEmptyCluster, 3);
        assert_eq!(line, "FirstEmptyCluster = +0000000000000003\n");
        assert_eq!(
            Setting::parse_line(line.trim_end()),
            Some((Setting::FirstEmptyCluster, 3))
        );
        assert_eq!(
            Setting::parse_line("ClusterSize =10"),
            Some((Setting::ClusterSize, 10))
        );
        assert_eq!(
            Setting::parse_line("ClusterSize = ten"),
            Some((Setting::ClusterSize, -1))
        );
        assert_eq!(Setting::parse_line("-----"), None);
    }

    #[test]
    fn test_row_layout() {
        let mut entry = FileEntry::new("dir/a b.txt", 12);
        entry.mode = Some(OpenMode::WriteOnly);
        entry.open_count = 3;
        let row = encode_row(&entry);
        assert_eq!(row, "dir/a b.txt +0000000000000012 WO   03\n");

        let line = row.trim_end_matches('\n').as_bytes();
        let (name, tail) = split_row(line).unwrap();
        assert_eq!(name, b"dir/a b.txt");
        let tail = decode_row_tail(tail).unwrap();
        assert_eq!(tail.first_cluster, 12);
        assert_eq!(tail.mode, Some(OpenMode::WriteOnly));
        assert_eq!(tail.open_count, 3);
    }

    #[test]
    fn test_blank_mode_keeps_width() {
        let closed = encode_row_tail(RowTail {
            first_cluster: 0,
            mode: None,
            open_count: 0,
        });
        let open = encode_row_tail(RowTail {
            first_cluster: 0,
            mode: Some(OpenMode::ReadOnly),
            open_count: 20,
        });
        assert_eq!(closed.len(), ROW_TAIL_WIDTH);
        assert_eq!(open.len(), ROW_TAIL_WIDTH);
        assert_eq!(decode_row_tail(closed.as_bytes()).unwrap().mode, None);
    }

    #[test]
    fn test_corrupt_row_tail_rejected() {
        assert!(decode_row_tail(b" +00000000000000x2 WO   01").is_none());
        assert!(decode_row_tail(b" +0000000000000002 XX   01").is_none());
        assert!(decode_row_tail(b" +0000000000000002 WO   0a").is_none());
        assert!(split_row(b"short").is_none());
    }

    #[test]
    fn test_name_validation() {
        assert!(is_valid_name("a.txt"));
        assert!(is_valid_name("/tmp/vfs/a b.txt"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("a\nb"));
        assert!(!is_valid_name(INFO_END));
    }
}
