pub mod batch;
pub mod contribution;
pub mod engine;
pub mod record;
pub mod validator;

pub use batch::{run_batch, run_batch_parallel, run_batch_rows, BatchRow, BatchSummary};
pub use contribution::{analyze, Contribution, ContributionKind, Direction, INTERCEPT_LABEL};
pub use engine::{score, score_validated, ScoringResult};
pub use record::{parse_population, FeatureValue, PropertyRecord, RawValue, ValidatedRecord};
pub use validator::{check, validate, IssueKind, ValidationIssue, MUNICIPALITY_FEATURE};
