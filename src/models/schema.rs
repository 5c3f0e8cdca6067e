use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Contents of one model file.
///
/// Example YAML:
/// ```yaml
/// models:
///   - id: testigos_menos_10000
///     name: "Testigos < 10.000 hab."
///     population: { min: 0, max: 10000 }
///     intercept: 4.25
///     coefficients:
///       superficie: 0.0031
///       ascensor: -0.12
///     municipalities:
///       "28079": 0.35
///     variables:
///       - { name: superficie, type: numeric, min: 0, max: 1000, description: "Superficie (m²)" }
///       - { name: ascensor, type: boolean, description: "Tiene ascensor" }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModelFile {
    pub models: Vec<ModelConfig>,
}

/// One model as written in configuration. Checked and turned into a
/// [`ModelDefinition`](super::ModelDefinition) by the registry.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    pub id: String,

    /// Display name (defaults to the id)
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub role: ModelRole,

    /// Applicability range, required for selector models
    #[serde(default)]
    pub population: Option<PopulationBounds>,

    #[serde(default)]
    pub intercept: f64,

    pub coefficients: BTreeMap<String, f64>,

    /// Municipality code -> fixed effect
    #[serde(default)]
    pub municipalities: BTreeMap<String, f64>,

    pub variables: Vec<VariableConfig>,
}

/// How a model gets picked for a record.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelRole {
    /// Chosen by the record's population
    #[default]
    Selector,
    /// Scored alongside the selected model, per registry policy
    Companion,
}

/// Half-open population range `[min, max)`. A missing `max` is unbounded.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PopulationBounds {
    #[serde(default)]
    pub min: u64,
    #[serde(default)]
    pub max: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct VariableConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: VariableKind,

    /// Inclusive lower bound (numeric only)
    #[serde(default)]
    pub min: Option<f64>,

    /// Inclusive upper bound (numeric only)
    #[serde(default)]
    pub max: Option<f64>,

    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    Numeric,
    Boolean,
}

impl std::fmt::Display for VariableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VariableKind::Numeric => f.pad("numeric"),
            VariableKind::Boolean => f.pad("boolean"),
        }
    }
}
