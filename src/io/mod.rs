pub mod csv;
pub mod json;
pub mod spreadsheet;

use anyhow::Result;
use std::path::Path;

pub use self::csv::{read_csv, write_results_csv, BatchTable};
pub use self::json::{read_record, write_results_json, BatchReport};
pub use self::spreadsheet::{is_workbook, read_workbook};

/// Read a table of rows with a header row. Workbooks (.xlsx, .xls, .ods)
/// use `worksheet`, or their first sheet; anything else is read as CSV.
pub fn read_table(path: &Path, worksheet: Option<&str>) -> Result<BatchTable> {
    if is_workbook(path) {
        read_workbook(path, worksheet)
    } else {
        if let Some(name) = worksheet {
            tracing::warn!(worksheet = name, "worksheet ignored for CSV input");
        }
        read_csv(path)
    }
}

/// Read a batch input: CSV or the first worksheet of a workbook.
pub fn read_batch(path: &Path) -> Result<BatchTable> {
    read_table(path, None)
}
