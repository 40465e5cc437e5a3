//! CSV export
//!
//! Files start with a UTF-8 byte-order mark so spreadsheet applications pick
//! the right encoding. The header is the union of field names in first-seen
//! order; records missing a field get an empty cell.

use crate::output::{OutputError, OutputResult};
use crate::table::{columns_of, Record};
use chrono::{DateTime, TimeZone};
use std::borrow::Cow;
use std::fmt::Display;
use std::path::{Path, PathBuf};

/// UTF-8 byte-order mark
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Which view of the table an export holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportScope {
    /// Every harvested record
    All,
    /// Records matching the current search
    Filtered,
    /// One display page, numbered from 1
    Page(usize),
}

impl ExportScope {
    fn label(&self) -> String {
        match self {
            Self::All => "all".to_string(),
            Self::Filtered => "filtered".to_string(),
            Self::Page(number) => format!("page_{}", number),
        }
    }
}

/// Builds an export file name such as `sscasn_page_2_20260130_142501.csv`
pub fn export_file_name<Tz>(prefix: &str, scope: ExportScope, at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!(
        "{}_{}_{}.csv",
        prefix,
        scope.label(),
        at.format("%Y%m%d_%H%M%S")
    )
}

/// Serializes records to CSV bytes, BOM included
pub fn records_to_csv<'a>(records: impl IntoIterator<Item = &'a Record>) -> Vec<u8> {
    let records: Vec<&Record> = records.into_iter().collect();
    let columns = columns_of(records.iter().copied());

    let mut out = String::new();
    push_row(&mut out, columns.iter().map(|c| Cow::Borrowed(c.as_str())));
    for record in &records {
        push_row(
            &mut out,
            columns.iter().map(|column| match record.get(column) {
                Some(value) => Cow::Owned(value.to_string()),
                None => Cow::Borrowed(""),
            }),
        );
    }

    let mut bytes = Vec::with_capacity(UTF8_BOM.len() + out.len());
    bytes.extend_from_slice(UTF8_BOM);
    bytes.extend_from_slice(out.as_bytes());
    bytes
}

/// Writes records as a CSV file at `path`, returning the path written
pub fn write_csv<'a>(
    path: &Path,
    records: impl IntoIterator<Item = &'a Record>,
) -> OutputResult<PathBuf> {
    let bytes = records_to_csv(records);
    std::fs::write(path, bytes).map_err(|source| OutputError::Write {
        path: path.display().to_string(),
        source,
    })?;
    Ok(path.to_path_buf())
}

fn push_row<'a>(out: &mut String, cells: impl Iterator<Item = Cow<'a, str>>) {
    for (i, cell) in cells.enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&escape_cell(&cell));
    }
    out.push('\n');
}

/// Quotes a cell when it contains a delimiter, quote, or line break
fn escape_cell(cell: &str) -> Cow<'_, str> {
    if cell.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", cell.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(cell)
    }
}
