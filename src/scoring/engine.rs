use serde::Serialize;

use super::contribution::{analyze, Contribution, ContributionKind, INTERCEPT_LABEL};
use super::record::{PropertyRecord, ValidatedRecord};
use super::validator::{check, IssueKind, ValidationIssue, MUNICIPALITY_FEATURE};
use crate::error::ScoreError;
use crate::models::{ModelDefinition, RegistryPolicy};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringResult {
    pub model_id: String,
    pub model_name: String,
    /// Raw linear score, never clamped
    pub total: f64,
    pub intercept: f64,
    /// Set when a configured clamp moved the reported value
    pub clamped: Option<f64>,
    /// Largest share first
    pub contributions: Vec<Contribution>,
}

impl ScoringResult {
    /// Value to show and export: the clamped value if any, else the total.
    pub fn reported(&self) -> f64 {
        self.clamped.unwrap_or(self.total)
    }

    /// Contributions of the terms other than the intercept.
    pub fn terms(&self) -> impl Iterator<Item = &Contribution> {
        self.contributions
            .iter()
            .filter(|c| c.kind != ContributionKind::Intercept)
    }
}

/// Validate `record` against `model` and score it.
///
/// Callers are expected to have validated already; the record is checked
/// again and any issue fails with [`ScoreError::InvalidRecord`].
pub fn score(
    record: &PropertyRecord,
    model: &ModelDefinition,
    policy: &RegistryPolicy,
) -> Result<ScoringResult, ScoreError> {
    let validated = check(record, model).map_err(|issues| ScoreError::InvalidRecord {
        model: model.id.clone(),
        issues,
    })?;
    score_validated(&validated, model, policy)
}

/// Score a record already checked against this model.
///
/// Terms are summed in declared variable order, then the municipality
/// effect, so identical input gives bit-identical totals. Finite inputs can
/// still overflow; a term that makes the score non-finite is reported as
/// [`IssueKind::NotFinite`] instead of producing an unusable breakdown.
pub fn score_validated(
    record: &ValidatedRecord,
    model: &ModelDefinition,
    policy: &RegistryPolicy,
) -> Result<ScoringResult, ScoreError> {
    debug_assert_eq!(record.model_id(), model.id);

    let mut issues = Vec::new();
    let mut sum = 0.0;
    for (name, value) in record.values() {
        let product = model.coefficient(name) * value.as_f64();
        if add_term(&mut sum, product) {
            issues.push(ValidationIssue::new(name, IssueKind::NotFinite));
        }
    }
    if let Some((_, effect)) = record.municipality() {
        if add_term(&mut sum, effect) {
            issues.push(ValidationIssue::new(MUNICIPALITY_FEATURE, IssueKind::NotFinite));
        }
    }
    let total = model.intercept + sum;
    if sum.is_finite() && !total.is_finite() {
        issues.push(ValidationIssue::new(INTERCEPT_LABEL, IssueKind::NotFinite));
    }

    let contributions = if issues.is_empty() {
        analyze(record, model, total)
    } else {
        Vec::new()
    };
    // Tiny totals from cancelling terms can still blow up the shares
    issues.extend(
        contributions
            .iter()
            .filter(|c| !c.percentage.is_finite())
            .map(|c| ValidationIssue::new(&c.label, IssueKind::NotFinite)),
    );
    if !issues.is_empty() {
        tracing::debug!(model = %model.id, issues = issues.len(), "score is not finite");
        return Err(ScoreError::InvalidRecord {
            model: model.id.clone(),
            issues,
        });
    }

    let clamped = policy.clamp.and_then(|bounds| bounds.apply(total));
    if let Some(value) = clamped {
        tracing::debug!(model = %model.id, total, clamped = value, "result clamped");
    }

    Ok(ScoringResult {
        model_id: model.id.clone(),
        model_name: model.name.clone(),
        total,
        intercept: model.intercept,
        clamped,
        contributions,
    })
}

/// Add `term` to the running sum. True when this term is what made the
/// sum (or the term itself) non-finite.
fn add_term(sum: &mut f64, term: f64) -> bool {
    let was_finite = sum.is_finite();
    *sum += term;
    !term.is_finite() || (was_finite && !sum.is_finite())
}
