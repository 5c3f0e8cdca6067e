use std::path::PathBuf;
use thiserror::Error;

use crate::scoring::ValidationIssue;

/// Model configuration that cannot be used. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read model file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid model pattern {pattern}: {message}")]
    Glob { pattern: String, message: String },

    #[error("no model files found in {0}")]
    NoModelFiles(PathBuf),

    #[error("invalid model configuration:\n  - {}", .0.join("\n  - "))]
    Invalid(Vec<String>),
}

/// No selector model covers the given population.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("no model covers population {population}")]
pub struct NoModelMatch {
    pub population: u64,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScoreError {
    /// The record reached the engine without passing validation.
    #[error("record is not valid for model '{model}': {}", format_issues(.issues))]
    InvalidRecord {
        model: String,
        issues: Vec<ValidationIssue>,
    },
}

/// Failure to evaluate one record end to end: model lookup, validation
/// and scoring.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvaluationError {
    #[error(transparent)]
    NoModelMatch(#[from] NoModelMatch),

    #[error("unknown model '{0}'")]
    UnknownModel(String),

    #[error("'{0}' is selected by population and cannot be requested as a companion")]
    NotACompanion(String),

    #[error("{model}: {}", format_issues(.issues))]
    Invalid {
        model: String,
        issues: Vec<ValidationIssue>,
    },

    /// Row could not be turned into a record (e.g. unreadable population cell)
    #[error("{0}")]
    Malformed(String),
}

impl From<ScoreError> for EvaluationError {
    fn from(err: ScoreError) -> Self {
        match err {
            ScoreError::InvalidRecord { model, issues } => EvaluationError::Invalid { model, issues },
        }
    }
}

pub(crate) fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
