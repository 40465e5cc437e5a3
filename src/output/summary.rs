//! Harvest summaries and record listings for the terminal

use crate::harvest::HarvestOutcome;
use crate::table::Record;

/// Formats the outcome of a harvest as a short report
pub fn format_summary(outcome: &HarvestOutcome) -> String {
    let table = &outcome.table;
    let mut out = String::new();

    out.push_str("=== Harvest Summary ===\n\n");
    out.push_str(&format!("  Status: {}\n", outcome.status));
    out.push_str(&format!("  Records: {}\n", table.len()));
    out.push_str(&format!("  Columns: {}\n", table.columns().len()));
    out.push_str(&format!("  Pages fetched: {}\n", outcome.pages_fetched));

    if let Some(total) = outcome.total_hint {
        out.push_str(&format!("  Server total: {}\n", total));
    }

    if table.columns().iter().any(|c| c == "ins_nm") {
        out.push_str(&format!(
            "  Distinct agencies: {}\n",
            table.distinct_values("ins_nm")
        ));
    }

    out.push_str(&format!(
        "  Duration: {:.1}s\n",
        outcome.duration().num_milliseconds() as f64 / 1000.0
    ));

    if !outcome.failed_offsets.is_empty() {
        let offsets: Vec<String> = outcome
            .failed_offsets
            .iter()
            .map(|o| o.to_string())
            .collect();
        out.push_str(&format!("  Failed offsets: {}\n", offsets.join(", ")));
    }

    if let Some(kind) = outcome.last_failure {
        out.push_str(&format!("  Last failure: {}\n", kind));
    }

    out
}

/// Prints the harvest summary to stdout
pub fn print_summary(outcome: &HarvestOutcome) {
    print!("{}", format_summary(outcome));
}

/// Formats one display page of records, numbering rows from `first_row`
///
/// Each record is printed as an indented block of `field: value` lines.
pub fn format_record_page(records: &[&Record], first_row: usize) -> String {
    let mut out = String::new();
    for (i, record) in records.iter().enumerate() {
        out.push_str(&format!("#{}\n", first_row + i));
        for (name, value) in record.fields() {
            out.push_str(&format!("  {}: {}\n", name, value));
        }
    }
    out
}
