use serde::Serialize;

use super::record::{FeatureValue, PropertyRecord, RawValue, ValidatedRecord};
use crate::models::validation::is_municipality_code;
use crate::models::{ModelDefinition, VariableKind, VariableSpec};

/// Feature name used in issues about the municipality code.
pub const MUNICIPALITY_FEATURE: &str = "municipality";

/// One problem with one feature of a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub feature: String,
    pub kind: IssueKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum IssueKind {
    Missing,
    WrongType {
        expected: VariableKind,
        found: String,
    },
    NotFinite,
    OutOfRange {
        value: f64,
        min: Option<f64>,
        max: Option<f64>,
    },
    UnrecognizedBoolean {
        found: String,
    },
    InvalidMunicipality {
        found: String,
    },
}

impl ValidationIssue {
    pub fn new(feature: &str, kind: IssueKind) -> Self {
        Self {
            feature: feature.to_string(),
            kind,
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            IssueKind::Missing => write!(f, "{}: missing", self.feature),
            IssueKind::WrongType { expected, found } => {
                write!(f, "{}: expected {}, found {}", self.feature, expected, found)
            }
            IssueKind::NotFinite => write!(f, "{}: value is not a finite number", self.feature),
            IssueKind::OutOfRange { value, min, max } => {
                let lo = min.map_or("-∞".to_string(), |v| v.to_string());
                let hi = max.map_or("∞".to_string(), |v| v.to_string());
                write!(f, "{}: {} is outside [{}, {}]", self.feature, value, lo, hi)
            }
            IssueKind::UnrecognizedBoolean { found } => {
                write!(f, "{}: '{}' is not a boolean (use true/false or 0/1)", self.feature, found)
            }
            IssueKind::InvalidMunicipality { found } => {
                write!(f, "{}: '{}' is not a valid municipality code", self.feature, found)
            }
        }
    }
}

/// Check a record against every variable the model declares.
/// Returns the full issue set; empty means the record can be scored.
pub fn validate(record: &PropertyRecord, model: &ModelDefinition) -> Vec<ValidationIssue> {
    match check(record, model) {
        Ok(_) => Vec::new(),
        Err(issues) => issues,
    }
}

/// Validate and convert in one pass.
pub fn check(
    record: &PropertyRecord,
    model: &ModelDefinition,
) -> Result<ValidatedRecord, Vec<ValidationIssue>> {
    let mut issues = Vec::new();
    let mut values = Vec::with_capacity(model.variables.len());

    for spec in &model.variables {
        let Some(raw) = record.features.get(&spec.name) else {
            issues.push(ValidationIssue::new(&spec.name, IssueKind::Missing));
            continue;
        };
        match convert(raw, spec) {
            Ok(value) => values.push((spec.name.clone(), value)),
            Err(kind) => issues.push(ValidationIssue::new(&spec.name, kind)),
        }
    }

    let mut municipality = None;
    if let Some(code) = &record.municipality {
        let code = code.trim();
        if is_municipality_code(code) {
            municipality = model
                .municipality_effect(code)
                .map(|effect| (code.to_string(), effect));
        } else {
            issues.push(ValidationIssue::new(
                MUNICIPALITY_FEATURE,
                IssueKind::InvalidMunicipality {
                    found: code.to_string(),
                },
            ));
        }
    }

    if issues.is_empty() {
        Ok(ValidatedRecord {
            model_id: model.id.clone(),
            values,
            municipality,
        })
    } else {
        Err(issues)
    }
}

fn convert(raw: &RawValue, spec: &VariableSpec) -> Result<FeatureValue, IssueKind> {
    match spec.kind {
        VariableKind::Numeric => {
            let value = match raw {
                RawValue::Number(n) => *n,
                RawValue::Text(s) => parse_number(s).ok_or_else(|| IssueKind::WrongType {
                    expected: VariableKind::Numeric,
                    found: raw.to_string(),
                })?,
                RawValue::Bool(_) => {
                    return Err(IssueKind::WrongType {
                        expected: VariableKind::Numeric,
                        found: raw.to_string(),
                    })
                }
            };
            if !value.is_finite() {
                return Err(IssueKind::NotFinite);
            }
            if !spec.in_range(value) {
                return Err(IssueKind::OutOfRange {
                    value,
                    min: spec.min,
                    max: spec.max,
                });
            }
            Ok(FeatureValue::Number(value))
        }
        VariableKind::Boolean => match raw {
            RawValue::Bool(b) => Ok(FeatureValue::Flag(*b)),
            RawValue::Number(n) if *n == 0.0 => Ok(FeatureValue::Flag(false)),
            RawValue::Number(n) if *n == 1.0 => Ok(FeatureValue::Flag(true)),
            RawValue::Text(s) => parse_flag(s)
                .map(FeatureValue::Flag)
                .ok_or_else(|| IssueKind::UnrecognizedBoolean { found: s.clone() }),
            RawValue::Number(n) => Err(IssueKind::UnrecognizedBoolean {
                found: n.to_string(),
            }),
        },
    }
}

/// Spreadsheet cells may use a decimal comma ("80,5").
fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    s.parse::<f64>()
        .ok()
        .or_else(|| s.replacen(',', ".", 1).parse::<f64>().ok())
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelRole;
    use std::collections::BTreeMap;

    fn model() -> ModelDefinition {
        ModelDefinition {
            id: "testigos".to_string(),
            name: "Testigos".to_string(),
            role: ModelRole::Selector,
            population: None,
            intercept: 1000.0,
            coefficients: BTreeMap::from([
                ("superficie".to_string(), 150.5),
                ("habitaciones".to_string(), 10.0),
                ("ascensor".to_string(), 5.0),
            ]),
            municipalities: BTreeMap::from([("28079".to_string(), 0.35)]),
            variables: vec![
                VariableSpec::numeric("superficie").with_range(0.0, 1000.0),
                VariableSpec::numeric("habitaciones").with_range(0.0, 20.0),
                VariableSpec::boolean("ascensor"),
            ],
        }
    }

    fn full_record() -> PropertyRecord {
        PropertyRecord::new(8_000)
            .with("superficie", RawValue::Number(80.0))
            .with("habitaciones", RawValue::Number(3.0))
            .with("ascensor", RawValue::Bool(true))
    }

    #[test]
    fn test_valid_record() {
        assert!(validate(&full_record(), &model()).is_empty());
    }

    #[test]
    fn test_missing_feature_is_single_issue() {
        let mut record = full_record();
        record.features.remove("habitaciones");
        let issues = validate(&record, &model());
        assert_eq!(issues, vec![ValidationIssue::new("habitaciones", IssueKind::Missing)]);
    }

    #[test]
    fn test_all_issues_reported() {
        let record = PropertyRecord::new(8_000)
            .with("superficie", RawValue::Number(5000.0))
            .with("ascensor", RawValue::Text("si".to_string()));
        let issues = validate(&record, &model());
        assert_eq!(issues.len(), 3);
        assert_eq!(issues[0].feature, "superficie");
        assert!(matches!(issues[0].kind, IssueKind::OutOfRange { .. }));
        assert_eq!(issues[1].kind, IssueKind::Missing);
        assert!(matches!(issues[2].kind, IssueKind::UnrecognizedBoolean { .. }));
    }

    #[test]
    fn test_range_is_inclusive() {
        let edge = full_record()
            .with("superficie", RawValue::Number(1000.0))
            .with("habitaciones", RawValue::Number(0.0));
        assert!(validate(&edge, &model()).is_empty());

        let over = full_record().with("habitaciones", RawValue::Number(20.01));
        assert_eq!(validate(&over, &model()).len(), 1);
    }

    #[test]
    fn test_numeric_text_accepted() {
        let record = full_record()
            .with("superficie", RawValue::Text(" 80.5 ".to_string()))
            .with("habitaciones", RawValue::Text("3".to_string()));
        let validated = check(&record, &model()).unwrap();
        assert_eq!(validated.values()[0].1, FeatureValue::Number(80.5));
    }

    #[test]
    fn test_decimal_comma_accepted() {
        let record = full_record().with("superficie", RawValue::Text("80,5".to_string()));
        let validated = check(&record, &model()).unwrap();
        assert_eq!(validated.values()[0].1, FeatureValue::Number(80.5));
    }

    #[test]
    fn test_wrong_type_for_numeric() {
        let record = full_record()
            .with("superficie", RawValue::Bool(true))
            .with("habitaciones", RawValue::Text("tres".to_string()));
        let issues = validate(&record, &model());
        assert_eq!(issues.len(), 2);
        assert!(issues
            .iter()
            .all(|i| matches!(i.kind, IssueKind::WrongType { expected: VariableKind::Numeric, .. })));
    }

    #[test]
    fn test_not_finite() {
        let record = full_record().with("superficie", RawValue::Text("NaN".to_string()));
        let issues = validate(&record, &model());
        assert_eq!(issues[0].kind, IssueKind::NotFinite);
    }

    #[test]
    fn test_boolean_coercion() {
        for (raw, expected) in [
            (RawValue::Number(0.0), false),
            (RawValue::Number(1.0), true),
            (RawValue::Text("TRUE".to_string()), true),
            (RawValue::Text(" false ".to_string()), false),
            (RawValue::Text("1".to_string()), true),
        ] {
            let record = full_record().with("ascensor", raw);
            let validated = check(&record, &model()).unwrap();
            assert_eq!(validated.values()[2].1, FeatureValue::Flag(expected));
        }
    }

    #[test]
    fn test_boolean_rejects_other_numbers() {
        let record = full_record().with("ascensor", RawValue::Number(2.0));
        let issues = validate(&record, &model());
        assert_eq!(
            issues[0].kind,
            IssueKind::UnrecognizedBoolean { found: "2".to_string() }
        );
    }

    #[test]
    fn test_boolean_rejects_arbitrary_text() {
        let record = full_record().with("ascensor", RawValue::Text("yes".to_string()));
        assert_eq!(validate(&record, &model()).len(), 1);
    }

    #[test]
    fn test_extra_features_ignored() {
        let record = full_record().with("referencia", RawValue::Text("A-17".to_string()));
        assert!(validate(&record, &model()).is_empty());
    }

    #[test]
    fn test_known_municipality_resolved() {
        let record = full_record().with_municipality("28079");
        let validated = check(&record, &model()).unwrap();
        assert_eq!(validated.municipality(), Some(("28079", 0.35)));
    }

    #[test]
    fn test_unknown_municipality_is_reference_category() {
        let record = full_record().with_municipality("41091");
        let validated = check(&record, &model()).unwrap();
        assert_eq!(validated.municipality(), None);
    }

    #[test]
    fn test_malformed_municipality() {
        let record = full_record().with_municipality("28-079");
        let issues = validate(&record, &model());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].feature, MUNICIPALITY_FEATURE);
    }

    #[test]
    fn test_validation_is_pure() {
        let record = full_record();
        let before = record.clone();
        let first = validate(&record, &model());
        let second = validate(&record, &model());
        assert_eq!(first, second);
        assert_eq!(record, before);
    }

    #[test]
    fn test_issue_display() {
        let issue = ValidationIssue::new(
            "habitaciones",
            IssueKind::OutOfRange { value: 25.0, min: Some(0.0), max: Some(20.0) },
        );
        assert_eq!(issue.to_string(), "habitaciones: 25 is outside [0, 20]");
    }
}
