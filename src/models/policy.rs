use serde::{Deserialize, Serialize};

/// Registry-wide behaviour that is a product decision rather than part of
/// any single model.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RegistryPolicy {
    /// When companion models are scored
    #[serde(default)]
    pub companions: CompanionPolicy,

    /// Allow overlapping selector ranges; the first model in load order wins
    #[serde(default)]
    pub allow_overlap: bool,

    /// Optional bounds for reported results. Absent means no clamping.
    #[serde(default)]
    pub clamp: Option<ClampBounds>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompanionPolicy {
    /// Every companion is scored with the population-selected model
    #[default]
    Always,
    /// Companions are scored only when requested by id
    Independent,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ClampBounds {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl ClampBounds {
    /// Returns the bounded value, or `None` when `value` is already inside.
    pub fn apply(&self, value: f64) -> Option<f64> {
        if let Some(min) = self.min {
            if value < min {
                return Some(min);
            }
        }
        if let Some(max) = self.max {
            if value > max {
                return Some(max);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RegistryPolicy::default();
        assert_eq!(policy.companions, CompanionPolicy::Always);
        assert!(!policy.allow_overlap);
        assert!(policy.clamp.is_none());
    }

    #[test]
    fn test_partial_policy_parse() {
        let yaml = r#"
companions: independent
clamp:
  max: 25.0
"#;
        let policy: RegistryPolicy = serde_saphyr::from_str(yaml).unwrap();
        assert_eq!(policy.companions, CompanionPolicy::Independent);
        assert_eq!(policy.clamp, Some(ClampBounds { min: None, max: Some(25.0) }));
    }

    #[test]
    fn test_clamp_apply() {
        let bounds = ClampBounds { min: Some(0.0), max: Some(10.0) };
        assert_eq!(bounds.apply(5.0), None);
        assert_eq!(bounds.apply(0.0), None);
        assert_eq!(bounds.apply(-1.0), Some(0.0));
        assert_eq!(bounds.apply(12.5), Some(10.0));
    }

    #[test]
    fn test_open_clamp_is_noop() {
        assert_eq!(ClampBounds::default().apply(-1e9), None);
    }
}
