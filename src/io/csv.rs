use anyhow::{Context, Result};
use atomic_write_file::AtomicWriteFile;
use std::fs::File;
use std::path::Path;

use crate::config::BatchConfig;
use crate::error::EvaluationError;
use crate::scoring::{parse_population, BatchRow, PropertyRecord, RawValue};

/// A spreadsheet as read: headers and raw cells, kept so the results file
/// can repeat the input columns.
#[derive(Debug, Clone)]
pub struct BatchTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl BatchTable {
    /// Turn each row into a record. Rows whose population cell is missing or
    /// unreadable become `Malformed` errors in place.
    pub fn records(&self, columns: &BatchConfig) -> Vec<Result<PropertyRecord, EvaluationError>> {
        let population_col = self.column(&columns.population_column);
        let municipality_col = self.column(&columns.municipality_column);

        self.rows
            .iter()
            .map(|row| {
                let Some(pop_idx) = population_col else {
                    return Err(EvaluationError::Malformed(format!(
                        "column '{}' not found",
                        columns.population_column
                    )));
                };
                let population = parse_population(cell(row, pop_idx)).map_err(|msg| {
                    EvaluationError::Malformed(format!("{}: {}", columns.population_column, msg))
                })?;

                let mut record = PropertyRecord::new(population);
                for (i, header) in self.headers.iter().enumerate() {
                    if Some(i) == population_col || Some(i) == municipality_col {
                        continue;
                    }
                    let value = cell(row, i).trim();
                    // Empty cells count as absent
                    if !value.is_empty() {
                        record
                            .features
                            .insert(header.clone(), RawValue::Text(value.to_string()));
                    }
                }
                if let Some(idx) = municipality_col {
                    let code = cell(row, idx).trim();
                    if !code.is_empty() {
                        record.municipality = Some(code.to_string());
                    }
                }
                Ok(record)
            })
            .collect()
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    }
}

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(String::as_str).unwrap_or("")
}

/// Read a CSV file with a header row.
pub fn read_csv(path: &Path) -> Result<BatchTable> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open batch file at {}", path.display()))?;
    let mut rdr = ::csv::ReaderBuilder::new().flexible(true).from_reader(file);

    let headers: Vec<String> = rdr
        .headers()
        .context("Failed to read CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read CSV row {}", idx + 1))?;
        rows.push(record.iter().map(|s| s.to_string()).collect());
    }

    tracing::debug!(path = %path.display(), rows = rows.len(), "batch file read");
    Ok(BatchTable { headers, rows })
}

/// Write the input columns followed by `model`, `result`, one column per
/// companion id and `error`. Exactly one output row per input row.
pub fn write_results_csv(
    path: &Path,
    table: &BatchTable,
    results: &[BatchRow],
    companions: &[String],
) -> Result<()> {
    let mut file = AtomicWriteFile::open(path)
        .with_context(|| format!("Failed to open atomic write file at {}", path.display()))?;

    {
        let mut wtr = ::csv::Writer::from_writer(&mut file);
        let mut header = table.headers.clone();
        header.extend(["model".to_string(), "result".to_string()]);
        header.extend(companions.iter().cloned());
        header.push("error".to_string());
        wtr.write_record(&header).context("Failed to write CSV header")?;

        for (row, result) in table.rows.iter().zip(results) {
            let mut out: Vec<String> = (0..table.headers.len())
                .map(|i| cell(row, i).to_string())
                .collect();
            out.extend(result_cells(result, companions));
            wtr.write_record(&out)
                .with_context(|| format!("Failed to write CSV row {}", result.index + 1))?;
        }
        wtr.flush().context("Failed to flush CSV output")?;
    }

    file.commit().context("Failed to save batch results")?;
    Ok(())
}

/// Cells appended after the input columns for one row.
pub(crate) fn result_cells(row: &BatchRow, companions: &[String]) -> Vec<String> {
    match &row.outcome {
        Ok(evaluation) => {
            let mut cells = vec![
                evaluation.primary.model_id.clone(),
                evaluation.primary.reported().to_string(),
            ];
            for id in companions {
                let value = evaluation
                    .companions
                    .iter()
                    .find(|c| c.model_id == *id)
                    .map(|c| c.reported().to_string())
                    .unwrap_or_default();
                cells.push(value);
            }
            cells.push(evaluation.companion_error_message().unwrap_or_default());
            cells
        }
        Err(err) => {
            let mut cells = vec![String::new(), String::new()];
            cells.extend(companions.iter().map(|_| String::new()));
            cells.push(err.to_string());
            cells
        }
    }
}
