use crate::table::Record;

/// Filters records by a case-insensitive substring over every field
///
/// An empty term returns every record. Matching records keep their original
/// relative order.
pub fn search<'a>(records: &'a [Record], term: &str) -> Vec<&'a Record> {
    if term.is_empty() {
        return records.iter().collect();
    }

    let needle = term.to_lowercase();
    records
        .iter()
        .filter(|record| record.contains_lowercase(&needle))
        .collect()
}

/// Returns the zero-based `page` of `items` with `page_size` items per page
///
/// Pages past the end (and a zero page size) yield an empty slice.
pub fn paginate<T>(items: &[T], page: usize, page_size: usize) -> &[T] {
    let start = match page.checked_mul(page_size) {
        Some(start) if start < items.len() && page_size > 0 => start,
        _ => return &[],
    };
    let end = start.saturating_add(page_size).min(items.len());
    &items[start..end]
}

/// Number of display pages for `len` items; an empty sequence still has one page
pub fn page_count(len: usize, page_size: usize) -> usize {
    if len == 0 || page_size == 0 {
        return 1;
    }
    (len - 1) / page_size + 1
}
