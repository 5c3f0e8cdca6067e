use serde::Serialize;

use super::record::ValidatedRecord;
use crate::models::ModelDefinition;

/// Label used for the intercept entry.
pub const INTERCEPT_LABEL: &str = "_cons";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContributionKind {
    Feature,
    Municipality,
    Intercept,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increases,
    Decreases,
}

/// What one term of the linear formula adds to the total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contribution {
    pub label: String,
    pub kind: ContributionKind,
    pub value: f64,
    pub coefficient: f64,
    /// `value * coefficient`
    pub product: f64,
    /// `product / total * 100`, or 0 when the total is 0
    pub percentage: f64,
    pub direction: Direction,
}

impl Contribution {
    fn new(label: &str, kind: ContributionKind, value: f64, coefficient: f64, total: f64) -> Self {
        let product = value * coefficient;
        Self {
            label: label.to_string(),
            kind,
            value,
            coefficient,
            product,
            percentage: percentage_of(product, total),
            direction: if product < 0.0 {
                Direction::Decreases
            } else {
                Direction::Increases
            },
        }
    }
}

/// Share of `total`, in percent. A zero total has no meaningful ratio and
/// is reported as 0 for every term.
fn percentage_of(product: f64, total: f64) -> f64 {
    if total == 0.0 {
        0.0
    } else {
        product / total * 100.0
    }
}

/// Break a total into per-term contributions, largest share first.
///
/// Entries are one per declared variable, then the matched municipality
/// effect (if any), then the intercept. Equal shares keep that order.
pub fn analyze(record: &ValidatedRecord, model: &ModelDefinition, total: f64) -> Vec<Contribution> {
    let mut contributions: Vec<Contribution> = record
        .values()
        .iter()
        .map(|(name, value)| {
            Contribution::new(
                name,
                ContributionKind::Feature,
                value.as_f64(),
                model.coefficient(name),
                total,
            )
        })
        .collect();

    if let Some((code, effect)) = record.municipality() {
        contributions.push(Contribution::new(
            code,
            ContributionKind::Municipality,
            1.0,
            effect,
            total,
        ));
    }

    contributions.push(Contribution::new(
        INTERCEPT_LABEL,
        ContributionKind::Intercept,
        1.0,
        model.intercept,
        total,
    ));

    // Stable sort keeps declared order for ties
    contributions.sort_by(|a, b| {
        b.percentage
            .abs()
            .partial_cmp(&a.percentage.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    contributions
}
