//! Result table module
//!
//! This module holds the harvested data and the read-only operations over it:
//! - `Record` / `FieldValue`: one server entry as an ordered field mapping
//! - `ResultTable`: records in cursor order
//! - `search` / `paginate`: stable substring filtering and stateless slicing

mod query;
mod record;

pub use query::{page_count, paginate, search};
pub use record::{FieldValue, Record};

use std::collections::HashSet;

/// The ordered collection of harvested records
///
/// Records appear in cursor order: the order they would have if every page had
/// been fetched strictly sequentially. Only the harvester appends to a table;
/// once handed to the caller it is read-only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    records: Vec<Record>,
}

impl ResultTable {
    /// Creates an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from records that are already in order
    pub fn from_records(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub(crate) fn append(&mut self, records: Vec<Record>) {
        self.records.extend(records);
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.records.truncate(len);
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the union of field names in first-seen order
    ///
    /// Records need not share a schema, so a field that only appears in a later
    /// record is still listed, after every field seen before it.
    pub fn columns(&self) -> Vec<String> {
        columns_of(self.records.iter())
    }

    /// Counts the distinct display values of one field across the table
    ///
    /// Records without the field are ignored.
    pub fn distinct_values(&self, field: &str) -> usize {
        self.records
            .iter()
            .filter_map(|r| r.get(field))
            .map(|v| v.to_string())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Case-insensitive substring search over every field, see [`search`]
    pub fn search(&self, term: &str) -> Vec<&Record> {
        search(&self.records, term)
    }
}

/// Union of field names over any sequence of records, first-seen order
pub fn columns_of<'a>(records: impl Iterator<Item = &'a Record>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for record in records {
        for (name, _) in record.fields() {
            if seen.insert(name) {
                columns.push(name.to_string());
            }
        }
    }
    columns
}
