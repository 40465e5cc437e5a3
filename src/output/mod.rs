//! Output module for exporting and reporting harvest results
//!
//! This module handles:
//! - CSV export of the whole table, a search result, or one display page
//! - Human-readable harvest summaries and record listings

mod csv;
mod summary;

pub use self::csv::{export_file_name, records_to_csv, write_csv, ExportScope, UTF8_BOM};
pub use summary::{format_record_page, format_summary, print_summary};

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
