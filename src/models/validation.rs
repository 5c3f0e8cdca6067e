use std::collections::HashSet;

use super::definition::{ModelDefinition, PopulationRange, VariableSpec};
use super::policy::RegistryPolicy;
use super::schema::{ModelConfig, ModelRole, VariableKind};

/// Check model configs and build definitions.
/// Returns all validation errors at once (not just the first).
pub fn build_models(
    configs: Vec<ModelConfig>,
    policy: &RegistryPolicy,
) -> Result<Vec<ModelDefinition>, Vec<String>> {
    let mut errors = Vec::new();
    let mut seen_ids = HashSet::new();

    if let Some(clamp) = policy.clamp {
        if !clamp.min.into_iter().chain(clamp.max).all(f64::is_finite) {
            errors.push("policy.clamp: bounds must be finite".to_string());
        }
        if let (Some(min), Some(max)) = (clamp.min, clamp.max) {
            if min > max {
                errors.push(format!("policy.clamp: min {} exceeds max {}", min, max));
            }
        }
    }

    let mut models = Vec::with_capacity(configs.len());
    for config in configs {
        if !seen_ids.insert(config.id.clone()) {
            errors.push(format!("models[{}]: duplicate model id", config.id));
            continue;
        }
        match build_model(config) {
            Ok(model) => models.push(model),
            Err(model_errors) => errors.extend(model_errors),
        }
    }

    if !policy.allow_overlap {
        errors.extend(overlap_errors(&models));
    }

    if errors.is_empty() {
        Ok(models)
    } else {
        Err(errors)
    }
}

fn build_model(config: ModelConfig) -> Result<ModelDefinition, Vec<String>> {
    let mut errors = Vec::new();
    let id = config.id.clone();

    if id.trim().is_empty() {
        errors.push("models[]: id must not be empty".to_string());
    }

    if !config.intercept.is_finite() {
        errors.push(format!("models[{}].intercept: must be finite", id));
    }

    let population = match (config.role, config.population) {
        (ModelRole::Selector, None) => {
            errors.push(format!(
                "models[{}].population: required for selector models",
                id
            ));
            None
        }
        (ModelRole::Companion, Some(_)) => {
            errors.push(format!(
                "models[{}].population: companion models are not selected by population",
                id
            ));
            None
        }
        (_, Some(bounds)) => {
            if let Some(max) = bounds.max {
                if bounds.min >= max {
                    errors.push(format!(
                        "models[{}].population: empty range, min {} must be below max {}",
                        id, bounds.min, max
                    ));
                }
            }
            Some(PopulationRange {
                min: bounds.min,
                max: bounds.max,
            })
        }
        (ModelRole::Companion, None) => None,
    };

    let mut declared = HashSet::new();
    let mut variables = Vec::with_capacity(config.variables.len());
    for (i, var) in config.variables.into_iter().enumerate() {
        if var.name.trim().is_empty() {
            errors.push(format!("models[{}].variables[{}].name: must not be empty", id, i));
        }
        if !declared.insert(var.name.clone()) {
            errors.push(format!(
                "models[{}].variables[{}]: '{}' is declared more than once",
                id, i, var.name
            ));
        }
        if var.kind == VariableKind::Boolean && (var.min.is_some() || var.max.is_some()) {
            errors.push(format!(
                "models[{}].variables[{}].range: boolean variable '{}' cannot have a range",
                id, i, var.name
            ));
        }
        let bounds_finite = var.min.into_iter().chain(var.max).all(f64::is_finite);
        if !bounds_finite {
            errors.push(format!(
                "models[{}].variables[{}].range: must be finite (omit a bound for no limit)",
                id, i
            ));
        }
        if let (Some(min), Some(max)) = (var.min, var.max) {
            if bounds_finite && min > max {
                errors.push(format!(
                    "models[{}].variables[{}].range: min {} exceeds max {}",
                    id, i, min, max
                ));
            }
        }
        if !config.coefficients.contains_key(&var.name) {
            errors.push(format!(
                "models[{}].variables[{}]: '{}' has no coefficient",
                id, i, var.name
            ));
        }
        variables.push(VariableSpec {
            name: var.name,
            kind: var.kind,
            min: var.min,
            max: var.max,
            description: var.description.unwrap_or_default(),
        });
    }

    for (name, coefficient) in &config.coefficients {
        if !declared.contains(name) {
            errors.push(format!(
                "models[{}].coefficients.{}: references undeclared variable",
                id, name
            ));
        }
        if !coefficient.is_finite() {
            errors.push(format!("models[{}].coefficients.{}: must be finite", id, name));
        }
    }

    for (code, effect) in &config.municipalities {
        if !is_municipality_code(code) {
            errors.push(format!(
                "models[{}].municipalities.{}: code must be 1-10 alphanumeric characters",
                id, code
            ));
        }
        if !effect.is_finite() {
            errors.push(format!("models[{}].municipalities.{}: must be finite", id, code));
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ModelDefinition {
        name: config.name.unwrap_or_else(|| id.clone()),
        id,
        role: config.role,
        population,
        intercept: config.intercept,
        coefficients: config.coefficients,
        municipalities: config.municipalities,
        variables,
    })
}

fn overlap_errors(models: &[ModelDefinition]) -> Vec<String> {
    let ranged: Vec<(&str, PopulationRange)> = models
        .iter()
        .filter_map(|m| m.population.map(|r| (m.id.as_str(), r)))
        .collect();

    let mut errors = Vec::new();
    for (i, (id_a, a)) in ranged.iter().enumerate() {
        for (id_b, b) in &ranged[i + 1..] {
            if a.overlaps(b) {
                errors.push(format!(
                    "models[{}].population: {} overlaps {} of model '{}' (set policy.allow_overlap to accept)",
                    id_b, b, a, id_a
                ));
            }
        }
    }
    errors
}

pub(crate) fn is_municipality_code(code: &str) -> bool {
    !code.is_empty() && code.len() <= 10 && code.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::schema::{PopulationBounds, VariableConfig};
    use crate::models::ClampBounds;
    use std::collections::BTreeMap;

    fn numeric(name: &str) -> VariableConfig {
        VariableConfig {
            name: name.to_string(),
            kind: VariableKind::Numeric,
            min: None,
            max: None,
            description: None,
        }
    }

    fn selector(id: &str, min: u64, max: Option<u64>) -> ModelConfig {
        ModelConfig {
            id: id.to_string(),
            name: None,
            role: ModelRole::Selector,
            population: Some(PopulationBounds { min, max }),
            intercept: 1.0,
            coefficients: BTreeMap::from([("superficie".to_string(), 0.5)]),
            municipalities: BTreeMap::new(),
            variables: vec![numeric("superficie")],
        }
    }

    #[test]
    fn test_valid_models() {
        let models = build_models(
            vec![selector("a", 0, Some(10_000)), selector("b", 10_000, None)],
            &RegistryPolicy::default(),
        )
        .unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].name, "a");
        assert_eq!(models[1].population.unwrap().max, None);
    }

    #[test]
    fn test_coefficient_without_variable() {
        let mut config = selector("a", 0, None);
        config.coefficients.insert("piscina".to_string(), 0.2);
        let errors = build_models(vec![config], &RegistryPolicy::default()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("models[a].coefficients.piscina"));
    }

    #[test]
    fn test_variable_without_coefficient() {
        let mut config = selector("a", 0, None);
        config.variables.push(numeric("banyos"));
        let errors = build_models(vec![config], &RegistryPolicy::default()).unwrap_err();
        assert!(errors[0].contains("'banyos' has no coefficient"));
    }

    #[test]
    fn test_duplicate_variable() {
        let mut config = selector("a", 0, None);
        config.variables.push(numeric("superficie"));
        let errors = build_models(vec![config], &RegistryPolicy::default()).unwrap_err();
        assert!(errors[0].contains("declared more than once"));
    }

    #[test]
    fn test_boolean_with_range() {
        let mut config = selector("a", 0, None);
        config.coefficients.insert("ascensor".to_string(), 0.1);
        config.variables.push(VariableConfig {
            kind: VariableKind::Boolean,
            max: Some(1.0),
            ..numeric("ascensor")
        });
        let errors = build_models(vec![config], &RegistryPolicy::default()).unwrap_err();
        assert!(errors[0].contains("models[a].variables[1].range"));
    }

    #[test]
    fn test_inverted_variable_range() {
        let mut config = selector("a", 0, None);
        config.variables[0].min = Some(5.0);
        config.variables[0].max = Some(2.0);
        let errors = build_models(vec![config], &RegistryPolicy::default()).unwrap_err();
        assert!(errors[0].contains("min 5 exceeds max 2"));
    }

    #[test]
    fn test_non_finite_variable_bound() {
        let mut config = selector("a", 0, None);
        config.variables[0].min = Some(f64::NAN);
        config.variables[0].max = Some(10.0);
        let errors = build_models(vec![config], &RegistryPolicy::default()).unwrap_err();
        assert_eq!(errors, vec!["models[a].variables[0].range: must be finite (omit a bound for no limit)"]);

        let mut config = selector("a", 0, None);
        config.variables[0].max = Some(f64::INFINITY);
        let errors = build_models(vec![config], &RegistryPolicy::default()).unwrap_err();
        assert!(errors[0].contains("models[a].variables[0].range: must be finite"));
    }

    #[test]
    fn test_non_finite_bound_fails_load() {
        let yaml = "models:\n  - id: a\n    population: { min: 0 }\n    coefficients: { x: 1.0 }\n    variables:\n      - { name: x, type: numeric, min: .nan, max: 10 }\n";
        let file: crate::models::ModelFile = serde_saphyr::from_str(yaml).unwrap();
        assert!(file.models[0].variables[0].min.unwrap().is_nan());
        let errors = build_models(file.models, &RegistryPolicy::default()).unwrap_err();
        assert!(errors[0].contains("models[a].variables[0].range: must be finite"));
    }

    #[test]
    fn test_selector_requires_population() {
        let mut config = selector("a", 0, None);
        config.population = None;
        let errors = build_models(vec![config], &RegistryPolicy::default()).unwrap_err();
        assert!(errors[0].contains("models[a].population: required"));
    }

    #[test]
    fn test_companion_rejects_population() {
        let mut config = selector("tasa", 0, None);
        config.role = ModelRole::Companion;
        let errors = build_models(vec![config], &RegistryPolicy::default()).unwrap_err();
        assert!(errors[0].contains("companion models are not selected by population"));
    }

    #[test]
    fn test_empty_population_range() {
        let errors = build_models(
            vec![selector("a", 100, Some(100))],
            &RegistryPolicy::default(),
        )
        .unwrap_err();
        assert!(errors[0].contains("empty range"));
    }

    #[test]
    fn test_overlap_rejected_by_default() {
        let errors = build_models(
            vec![selector("a", 0, Some(10_001)), selector("b", 10_000, None)],
            &RegistryPolicy::default(),
        )
        .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("models[b].population"));
        assert!(errors[0].contains("model 'a'"));
    }

    #[test]
    fn test_overlap_allowed_by_policy() {
        let policy = RegistryPolicy {
            allow_overlap: true,
            ..RegistryPolicy::default()
        };
        let models = build_models(
            vec![selector("a", 0, Some(10_001)), selector("b", 10_000, None)],
            &policy,
        )
        .unwrap();
        assert_eq!(models.len(), 2);
    }

    #[test]
    fn test_duplicate_model_id() {
        let errors = build_models(
            vec![selector("a", 0, Some(10)), selector("a", 10, None)],
            &RegistryPolicy::default(),
        )
        .unwrap_err();
        assert!(errors[0].contains("duplicate model id"));
    }

    #[test]
    fn test_bad_municipality_code() {
        let mut config = selector("a", 0, None);
        config.municipalities.insert("28-079".to_string(), 0.1);
        let errors = build_models(vec![config], &RegistryPolicy::default()).unwrap_err();
        assert!(errors[0].contains("municipalities.28-079"));
    }

    #[test]
    fn test_inverted_clamp() {
        let policy = RegistryPolicy {
            clamp: Some(ClampBounds { min: Some(10.0), max: Some(1.0) }),
            ..RegistryPolicy::default()
        };
        let errors = build_models(vec![selector("a", 0, None)], &policy).unwrap_err();
        assert!(errors[0].contains("policy.clamp"));
    }

    #[test]
    fn test_non_finite_clamp() {
        let policy = RegistryPolicy {
            clamp: Some(ClampBounds { min: Some(f64::NAN), max: None }),
            ..RegistryPolicy::default()
        };
        let errors = build_models(vec![selector("a", 0, None)], &policy).unwrap_err();
        assert_eq!(errors, vec!["policy.clamp: bounds must be finite"]);
    }

    #[test]
    fn test_collects_all_errors() {
        let mut first = selector("a", 0, None);
        first.intercept = f64::NAN; // Error 1
        let mut second = selector("b", 0, None);
        second.population = None; // Error 2
        let errors = build_models(vec![first, second], &RegistryPolicy::default()).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_municipality_code_format() {
        assert!(is_municipality_code("28079"));
        assert!(is_municipality_code("A1"));
        assert!(!is_municipality_code(""));
        assert!(!is_municipality_code("12345678901"));
        assert!(!is_municipality_code("28 079"));
    }
}
