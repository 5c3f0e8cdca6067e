use rayon::prelude::*;

use super::record::PropertyRecord;
use crate::error::EvaluationError;
use crate::models::{Evaluation, Registry};

/// Outcome for one input row, tagged with its original position.
#[derive(Debug, Clone)]
pub struct BatchRow {
    /// 0-based index in the input
    pub index: usize,
    pub outcome: Result<Evaluation, EvaluationError>,
}

impl BatchRow {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Counts for the end-of-run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub scored: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn of(rows: &[BatchRow]) -> Self {
        let scored = rows.iter().filter(|r| r.is_ok()).count();
        Self {
            total: rows.len(),
            scored,
            failed: rows.len() - scored,
        }
    }
}

/// Score every record independently. A failing row never stops the batch;
/// the output has one row per input, in input order.
pub fn run_batch(registry: &Registry, records: &[PropertyRecord]) -> Vec<BatchRow> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| evaluate_row(registry, index, Ok(record), &[]))
        .collect()
}

/// Like [`run_batch`], for rows that may already have failed to parse.
/// Those keep their slot and carry the parse error.
pub fn run_batch_rows(
    registry: &Registry,
    rows: &[Result<PropertyRecord, EvaluationError>],
    requested: &[String],
) -> Vec<BatchRow> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| evaluate_row(registry, index, row.as_ref(), requested))
        .collect()
}

/// Parallel [`run_batch_rows`]. Rows are independent; the indexed
/// collect keeps input order, so output matches the sequential runner.
pub fn run_batch_parallel(
    registry: &Registry,
    rows: &[Result<PropertyRecord, EvaluationError>],
    requested: &[String],
) -> Vec<BatchRow> {
    rows.par_iter()
        .enumerate()
        .map(|(index, row)| evaluate_row(registry, index, row.as_ref(), requested))
        .collect()
}

fn evaluate_row(
    registry: &Registry,
    index: usize,
    row: Result<&PropertyRecord, &EvaluationError>,
    requested: &[String],
) -> BatchRow {
    let outcome = match row {
        Ok(record) => registry.evaluate(record, requested),
        Err(err) => Err(err.clone()),
    };
    if let Err(ref err) = outcome {
        tracing::debug!(row = index + 1, error = %err, "row failed");
    }
    BatchRow { index, outcome }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ModelFile, RegistryPolicy};
    use crate::scoring::RawValue;

    fn registry() -> Registry {
        let yaml = r#"
models:
  - id: pequenos
    population: { min: 0, max: 10000 }
    intercept: 1000.0
    coefficients: { superficie: 150.5 }
    variables:
      - { name: superficie, type: numeric, min: 0, max: 1000 }
  - id: grandes
    population: { min: 10000 }
    intercept: 2000.0
    coefficients: { superficie: 100.0 }
    variables:
      - { name: superficie, type: numeric, min: 0, max: 1000 }
"#;
        let file: ModelFile = serde_saphyr::from_str(yaml).unwrap();
        Registry::from_models(file.models, RegistryPolicy::default()).unwrap()
    }

    fn record(population: u64, superficie: f64) -> PropertyRecord {
        PropertyRecord::new(population).with("superficie", RawValue::Number(superficie))
    }

    #[test]
    fn test_middle_row_fails_alone() {
        let records = vec![record(8_000, 80.0), record(8_000, 5_000.0), record(20_000, 50.0)];
        let rows = run_batch(&registry(), &records);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].outcome.as_ref().unwrap().primary.total, 13040.0);
        assert!(matches!(
            rows[1].outcome,
            Err(EvaluationError::Invalid { .. })
        ));
        assert_eq!(rows[2].outcome.as_ref().unwrap().primary.total, 7000.0);
        assert_eq!(rows[2].outcome.as_ref().unwrap().primary.model_id, "grandes");
    }

    #[test]
    fn test_indices_follow_input() {
        let records = vec![record(1, 1.0), record(2, 2.0), record(3, 3.0), record(4, 4.0)];
        let rows = run_batch(&registry(), &records);
        let indices: Vec<usize> = rows.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_empty_batch() {
        assert!(run_batch(&registry(), &[]).is_empty());
    }

    #[test]
    fn test_malformed_rows_keep_their_slot() {
        let rows = vec![
            Ok(record(8_000, 10.0)),
            Err(EvaluationError::Malformed("population: 'n/a' is not a whole number".to_string())),
            Ok(record(8_000, 20.0)),
        ];
        let out = run_batch_rows(&registry(), &rows, &[]);
        assert_eq!(out.len(), 3);
        assert!(out[0].is_ok());
        assert!(matches!(out[1].outcome, Err(EvaluationError::Malformed(_))));
        assert!(out[2].is_ok());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let rows: Vec<_> = (0..200u64)
            .map(|i| {
                if i % 7 == 0 {
                    Ok(record(i * 100, 2_000.0))
                } else {
                    Ok(record(i * 100, i as f64))
                }
            })
            .collect();
        let sequential = run_batch_rows(&registry(), &rows, &[]);
        let parallel = run_batch_parallel(&registry(), &rows, &[]);

        assert_eq!(sequential.len(), parallel.len());
        for (s, p) in sequential.iter().zip(&parallel) {
            assert_eq!(s.index, p.index);
            match (&s.outcome, &p.outcome) {
                (Ok(a), Ok(b)) => assert_eq!(a.primary, b.primary),
                (Err(a), Err(b)) => assert_eq!(a, b),
                _ => panic!("row {} differs", s.index),
            }
        }
    }

    #[test]
    fn test_summary_counts() {
        let records = vec![record(8_000, 80.0), record(8_000, -1.0), record(8_000, 1.0)];
        let rows = run_batch(&registry(), &records);
        assert_eq!(
            BatchSummary::of(&rows),
            BatchSummary { total: 3, scored: 2, failed: 1 }
        );
    }
}
