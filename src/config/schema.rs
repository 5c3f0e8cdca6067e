use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::RegistryPolicy;

/// Application configuration.
///
/// Example YAML:
/// ```yaml
/// models: models/
/// policy:
///   companions: always
///   clamp: { min: 0.0, max: 25.0 }
/// batch:
///   population_column: poblacion
///   municipality_column: codigo_municipio
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Model file or directory; relative paths resolve against the config file
    pub models: PathBuf,

    #[serde(default)]
    pub policy: RegistryPolicy,

    #[serde(default)]
    pub batch: BatchConfig,
}

/// Column names and execution options for spreadsheet batches.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    #[serde(default = "default_population_column")]
    pub population_column: String,

    #[serde(default = "default_municipality_column")]
    pub municipality_column: String,

    /// Score rows on the rayon thread pool
    #[serde(default)]
    pub parallel: bool,
}

fn default_population_column() -> String {
    "population".to_string()
}

fn default_municipality_column() -> String {
    "municipality".to_string()
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            population_column: default_population_column(),
            municipality_column: default_municipality_column(),
            parallel: false,
        }
    }
}
