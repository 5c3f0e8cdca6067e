//! Discount rate and risk premium valuation from linear coefficient models.
//!
//! Models are loaded once into an immutable [`models::Registry`]. Records are
//! validated against the selected model, scored as
//! `intercept + Σ coefficient × value`, and broken down into per-term
//! contributions. Batches score every row independently.

pub mod config;
pub mod convert;
pub mod error;
pub mod io;
pub mod logging;
pub mod models;
pub mod output;
pub mod scoring;

pub use error::{ConfigError, EvaluationError, NoModelMatch, ScoreError};
pub use models::{Evaluation, ModelDefinition, Registry, RegistryPolicy};
pub use scoring::{PropertyRecord, RawValue, ScoringResult};
