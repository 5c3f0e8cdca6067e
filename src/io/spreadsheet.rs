use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;

use super::csv::BatchTable;

/// Extensions read as workbooks rather than CSV.
pub const WORKBOOK_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "ods"];

pub fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| WORKBOOK_EXTENSIONS.iter().any(|w| ext.eq_ignore_ascii_case(w)))
}

/// Read one worksheet (the first when `worksheet` is None) with a header row.
pub fn read_workbook(path: &Path, worksheet: Option<&str>) -> Result<BatchTable> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open workbook at {}", path.display()))?;

    let range = match worksheet {
        Some(name) => workbook
            .worksheet_range(name)
            .with_context(|| format!("Failed to read worksheet '{}'", name))?,
        None => workbook
            .worksheet_range_at(0)
            .context("Workbook has no worksheets")?
            .context("Failed to read the first worksheet")?,
    };

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .map(|row| row.iter().map(cell_text).collect())
        .unwrap_or_default();
    let rows: Vec<Vec<String>> = rows.map(|row| row.iter().map(cell_text).collect()).collect();

    tracing::debug!(path = %path.display(), rows = rows.len(), "workbook read");
    Ok(BatchTable { headers, rows })
}

/// Cells become the same text a CSV export would hold, so both inputs go
/// through one set of parsing rules. Whole floats print without ".0".
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::Error(e) => format!("#{:?}", e),
        other => other.to_string(),
    }
}
