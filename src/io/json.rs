use anyhow::{Context, Result};
use atomic_write_file::AtomicWriteFile;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::File;
use std::path::Path;

use crate::scoring::{BatchRow, BatchSummary, PropertyRecord, ScoringResult};

/// Read a single property record from a JSON file.
pub fn read_record(path: &Path) -> Result<PropertyRecord> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open record file at {}", path.display()))?;
    serde_json::from_reader(file)
        .with_context(|| format!("Failed to parse record: invalid JSON in {}", path.display()))
}

/// JSON export of a batch run.
#[derive(Debug, Serialize)]
pub struct BatchReport<'a> {
    pub generated_at: DateTime<Utc>,
    pub total: usize,
    pub scored: usize,
    pub failed: usize,
    pub rows: Vec<ReportRow<'a>>,
}

#[derive(Debug, Serialize)]
pub struct ReportRow<'a> {
    /// 1-based, as shown to users
    pub row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<&'a ScoringResult>,
    #[serde(skip_serializing_if = "no_companions")]
    pub companions: &'a [ScoringResult],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<'a> BatchReport<'a> {
    pub fn new(rows: &'a [BatchRow]) -> Self {
        let summary = BatchSummary::of(rows);
        Self {
            generated_at: Utc::now(),
            total: summary.total,
            scored: summary.scored,
            failed: summary.failed,
            rows: rows
                .iter()
                .map(|row| match &row.outcome {
                    Ok(evaluation) => ReportRow {
                        row: row.index + 1,
                        result: Some(&evaluation.primary),
                        companions: &evaluation.companions,
                        error: evaluation.companion_error_message(),
                    },
                    Err(err) => ReportRow {
                        row: row.index + 1,
                        result: None,
                        companions: &[],
                        error: Some(err.to_string()),
                    },
                })
                .collect(),
        }
    }
}

fn no_companions(companions: &&[ScoringResult]) -> bool {
    companions.is_empty()
}

/// Write a batch report as pretty JSON, atomically.
pub fn write_results_json(path: &Path, rows: &[BatchRow]) -> Result<()> {
    let report = BatchReport::new(rows);

    let mut file = AtomicWriteFile::open(path)
        .with_context(|| format!("Failed to open atomic write file at {}", path.display()))?;
    serde_json::to_writer_pretty(&mut file, &report).context("Failed to serialize batch report")?;
    file.commit().context("Failed to save batch report")?;
    Ok(())
}
