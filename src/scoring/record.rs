use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// A feature value as it arrives from the user: JSON number/bool or a
/// spreadsheet/CLI text cell. Interpreted by the validator.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl std::fmt::Display for RawValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawValue::Bool(b) => write!(f, "{}", b),
            RawValue::Number(n) => write!(f, "{}", n),
            RawValue::Text(s) => write!(f, "'{}'", s),
        }
    }
}

/// Populations are whole numbers; spreadsheets and JSON exports often write
/// them as "8000.0" or with thousands separators ("8.000", "8,000").
pub fn parse_population(raw: &str) -> Result<u64, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("missing value".to_string());
    }
    if let Ok(n) = trimmed.parse::<u64>() {
        return Ok(n);
    }
    let digits: String = trimmed.chars().filter(|c| !matches!(c, '.' | ',' | ' ')).collect();
    if let Some(whole) = trimmed.strip_suffix(".0") {
        if let Ok(n) = whole.parse::<u64>() {
            return Ok(n);
        }
    }
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) && has_thousands_groups(trimmed) {
        return digits.parse::<u64>().map_err(|e| e.to_string());
    }
    Err(format!("'{}' is not a whole number", trimmed))
}

/// "1.234.567" / "1,234" style: every group after the first has 3 digits.
fn has_thousands_groups(s: &str) -> bool {
    let groups: Vec<&str> = s.split(['.', ',', ' ']).collect();
    groups.len() > 1
        && !groups[0].is_empty()
        && groups[0].len() <= 3
        && groups[1..].iter().all(|g| g.len() == 3)
}

/// Population as it may appear in a JSON record: a whole number, a float
/// with no fractional part, or text in any form [`parse_population`] reads.
#[derive(Deserialize)]
#[serde(untagged)]
enum PopulationInput {
    Whole(u64),
    Number(f64),
    Text(String),
}

fn deserialize_population<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match PopulationInput::deserialize(deserializer)? {
        PopulationInput::Whole(n) => Ok(n),
        PopulationInput::Number(n) if n.is_finite() && n >= 0.0 && n.fract() == 0.0 && n <= u64::MAX as f64 => {
            Ok(n as u64)
        }
        PopulationInput::Number(n) => Err(D::Error::custom(format!("{} is not a whole number", n))),
        PopulationInput::Text(s) => parse_population(&s).map_err(D::Error::custom),
    }
}

/// One property to value.
///
/// Example JSON:
/// ```json
/// { "population": 8000, "municipality": "28079",
///   "features": { "superficie": 80, "ascensor": true } }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PropertyRecord {
    /// Municipality population, used to select the model
    #[serde(deserialize_with = "deserialize_population")]
    pub population: u64,

    #[serde(default)]
    pub municipality: Option<String>,

    #[serde(default)]
    pub features: BTreeMap<String, RawValue>,
}

impl PropertyRecord {
    pub fn new(population: u64) -> Self {
        Self {
            population,
            municipality: None,
            features: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: &str, value: RawValue) -> Self {
        self.features.insert(name.to_string(), value);
        self
    }

    pub fn with_municipality(mut self, code: &str) -> Self {
        self.municipality = Some(code.to_string());
        self
    }
}

/// Typed feature value, only produced by validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue {
    Number(f64),
    Flag(bool),
}

impl FeatureValue {
    /// Numeric value used in the linear formula; flags count as 0 or 1.
    pub fn as_f64(&self) -> f64 {
        match self {
            FeatureValue::Number(n) => *n,
            FeatureValue::Flag(true) => 1.0,
            FeatureValue::Flag(false) => 0.0,
        }
    }
}

/// A record checked against one model. Features are in the model's
/// declared variable order.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRecord {
    pub(crate) model_id: String,
    pub(crate) values: Vec<(String, FeatureValue)>,
    /// Matched municipality code and its fixed effect
    pub(crate) municipality: Option<(String, f64)>,
}

impl ValidatedRecord {
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn values(&self) -> &[(String, FeatureValue)] {
        &self.values
    }

    pub fn municipality(&self) -> Option<(&str, f64)> {
        self.municipality
            .as_ref()
            .map(|(code, effect)| (code.as_str(), *effect))
    }
}
