use std::collections::BTreeMap;

use super::schema::{ModelRole, VariableKind};

/// Half-open population interval `[min, max)`; `max == None` is unbounded above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopulationRange {
    pub min: u64,
    pub max: Option<u64>,
}

impl PopulationRange {
    pub fn contains(&self, population: u64) -> bool {
        population >= self.min && self.max.map_or(true, |max| population < max)
    }

    pub fn overlaps(&self, other: &PopulationRange) -> bool {
        let self_below_other = self.max.is_some_and(|max| max <= other.min);
        let other_below_self = other.max.is_some_and(|max| max <= self.min);
        !(self_below_other || other_below_self)
    }
}

impl std::fmt::Display for PopulationRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.max {
            Some(max) => write!(f, "[{}, {})", self.min, max),
            None => write!(f, "[{}, ∞)", self.min),
        }
    }
}

/// A declared input variable of a model.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSpec {
    pub name: String,
    pub kind: VariableKind,
    /// Inclusive bounds, numeric variables only
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub description: String,
}

impl VariableSpec {
    pub fn numeric(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: VariableKind::Numeric,
            min: None,
            max: None,
            description: String::new(),
        }
    }

    pub fn boolean(name: &str) -> Self {
        Self {
            kind: VariableKind::Boolean,
            ..Self::numeric(name)
        }
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn in_range(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

/// A checked, immutable model. Every variable has exactly one coefficient.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDefinition {
    pub id: String,
    pub name: String,
    pub role: ModelRole,
    /// `Some` for selector models, `None` for companions
    pub population: Option<PopulationRange>,
    pub intercept: f64,
    pub coefficients: BTreeMap<String, f64>,
    pub municipalities: BTreeMap<String, f64>,
    /// Declaration order; also the summation order
    pub variables: Vec<VariableSpec>,
}

impl ModelDefinition {
    pub fn coefficient(&self, name: &str) -> f64 {
        self.coefficients.get(name).copied().unwrap_or(0.0)
    }

    /// Fixed effect for a municipality code, if the model has one for it.
    pub fn municipality_effect(&self, code: &str) -> Option<f64> {
        self.municipalities.get(code).copied()
    }
}
