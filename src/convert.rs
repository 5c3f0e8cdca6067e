//! Turn an exported coefficient sheet into a model file.
//!
//! Sheet layout (one sheet per model, saved as CSV):
//!
//! ```text
//! CODIGO,Coef.,Coef. superficie,Coef. antiguedad,Coef. _cons
//! 28079,0.35,0.0031,-0.012,4.25
//! 28080,-0.10,,,
//! VMma,0.02,,,
//! ```
//!
//! The first data row carries the variable coefficients (`Coef. <name>`)
//! and the intercept (`Coef. _cons`). Every row whose first cell is a
//! numeric municipality code and has a `Coef.` value adds a municipality
//! effect; text codes are summary rows and are skipped.

use anyhow::{bail, Context, Result};
use atomic_write_file::AtomicWriteFile;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use crate::io::BatchTable;
use crate::models::{ModelConfig, ModelFile, ModelRole, PopulationBounds, VariableConfig, VariableKind};

const EFFECT_COLUMN: &str = "Coef.";
const COEF_PREFIX: &str = "Coef. ";
const INTERCEPT_COLUMN: &str = "_cons";

/// Where the converted model applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applicability {
    Population(PopulationBounds),
    Companion,
}

pub fn sheet_to_model(
    table: &BatchTable,
    id: &str,
    name: Option<&str>,
    applicability: Applicability,
) -> Result<ModelConfig> {
    let Some(first) = table.rows.first() else {
        bail!("coefficient sheet has no data rows");
    };

    let mut intercept = None;
    let mut coefficients = BTreeMap::new();
    let mut variables = Vec::new();
    let mut effect_col = None;

    for (i, header) in table.headers.iter().enumerate() {
        let header = header.trim();
        if header == EFFECT_COLUMN {
            effect_col = Some(i);
            continue;
        }
        let Some(variable) = header.strip_prefix(COEF_PREFIX).map(str::trim) else {
            continue;
        };
        let raw = first.get(i).map(String::as_str).unwrap_or("");
        let value = parse_coefficient(raw)
            .with_context(|| format!("column '{}': invalid coefficient '{}'", header, raw))?;

        if variable == INTERCEPT_COLUMN {
            intercept = value;
        } else if let Some(value) = value {
            coefficients.insert(variable.to_string(), value);
            variables.push(VariableConfig {
                name: variable.to_string(),
                kind: VariableKind::Numeric,
                min: None,
                max: None,
                description: None,
            });
        }
    }

    if coefficients.is_empty() && intercept.is_none() {
        bail!("no '{}<variable>' columns found in coefficient sheet", COEF_PREFIX);
    }

    let mut municipalities = BTreeMap::new();
    if let Some(col) = effect_col {
        for row in &table.rows {
            let code = row.first().map(|c| c.trim()).unwrap_or("");
            let Some(code) = municipality_code(code) else {
                continue;
            };
            let raw = row.get(col).map(String::as_str).unwrap_or("");
            if let Ok(Some(effect)) = parse_coefficient(raw) {
                municipalities.insert(code, effect);
            }
        }
    }

    let (role, population) = match applicability {
        Applicability::Population(bounds) => (ModelRole::Selector, Some(bounds)),
        Applicability::Companion => (ModelRole::Companion, None),
    };

    tracing::info!(
        model = id,
        variables = variables.len(),
        municipalities = municipalities.len(),
        "converted coefficient sheet"
    );

    Ok(ModelConfig {
        id: id.to_string(),
        name: name.map(str::to_string),
        role,
        population,
        intercept: intercept.unwrap_or(0.0),
        coefficients,
        municipalities,
        variables,
    })
}

fn parse_coefficient(raw: &str) -> Result<Option<f64>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let value: f64 = raw.replace(',', ".").parse()?;
    Ok(Some(value))
}

/// Numeric codes only, normalised ("28079.0" -> "28079").
fn municipality_code(cell: &str) -> Option<String> {
    if cell.is_empty() {
        return None;
    }
    if cell.chars().all(|c| c.is_ascii_digit()) {
        return Some(cell.to_string());
    }
    let as_float: f64 = cell.parse().ok()?;
    if as_float.is_finite() && as_float >= 0.0 && as_float.fract() == 0.0 {
        Some(format!("{}", as_float as u64))
    } else {
        None
    }
}

/// Write a model file; JSON when the extension is `.json`, YAML otherwise.
pub fn write_model_file(path: &Path, file: &ModelFile) -> Result<()> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let content = if is_json {
        serde_json::to_string_pretty(file).context("Failed to serialize model file")?
    } else {
        serde_saphyr::to_string(file).context("Failed to serialize model file")?
    };

    let mut out = AtomicWriteFile::open(path)
        .with_context(|| format!("Failed to open atomic write file at {}", path.display()))?;
    out.write_all(content.as_bytes())
        .context("Failed to write model file")?;
    out.commit().context("Failed to save model file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Registry, RegistryPolicy};
    use std::env;
    use std::fs;

    fn table(rows: &[&[&str]]) -> BatchTable {
        BatchTable {
            headers: ["CODIGO", "Coef.", "Coef. superficie", "Coef. antiguedad", "Coef. _cons"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    fn sample() -> BatchTable {
        table(&[
            &["28079", "0.35", "0.0031", "-0.012", "4.25"],
            &["28080.0", "-0,10", "", "", ""],
            &["VMma", "0.02", "", "", ""],
            &["41091", "", "", "", ""],
        ])
    }

    #[test]
    fn test_convert_sheet() {
        let bounds = PopulationBounds { min: 0, max: Some(10_000) };
        let model = sheet_to_model(&sample(), "testigos_menos_10000", None, Applicability::Population(bounds))
            .unwrap();

        assert_eq!(model.intercept, 4.25);
        assert_eq!(model.coefficients["superficie"], 0.0031);
        assert_eq!(model.coefficients["antiguedad"], -0.012);
        assert_eq!(model.variables.len(), 2);
        assert_eq!(model.variables[0].name, "superficie");
        assert_eq!(model.municipalities.len(), 2);
        assert_eq!(model.municipalities["28079"], 0.35);
        assert_eq!(model.municipalities["28080"], -0.10);
        assert_eq!(model.population, Some(bounds));
    }

    #[test]
    fn test_converted_model_loads() {
        let model = sheet_to_model(&sample(), "tasa", Some("Tasa"), Applicability::Companion).unwrap();
        assert_eq!(model.role, ModelRole::Companion);
        let registry = Registry::from_models(vec![model], RegistryPolicy::default()).unwrap();
        assert_eq!(registry.companions().count(), 1);
    }

    #[test]
    fn test_empty_sheet() {
        assert!(sheet_to_model(&table(&[]), "x", None, Applicability::Companion).is_err());
    }

    #[test]
    fn test_bad_coefficient() {
        let sheet = table(&[&["1", "0.1", "abc", "", ""]]);
        let err = sheet_to_model(&sheet, "x", None, Applicability::Companion).unwrap_err();
        assert!(err.to_string().contains("Coef. superficie"));
    }

    #[test]
    fn test_municipality_code_normalisation() {
        assert_eq!(municipality_code("28079"), Some("28079".to_string()));
        assert_eq!(municipality_code("28079.0"), Some("28079".to_string()));
        assert_eq!(municipality_code("CODIGOINTEGRADO"), None);
        assert_eq!(municipality_code("1.5"), None);
        assert_eq!(municipality_code(""), None);
    }

    #[test]
    fn test_write_yaml_and_json() {
        let model = sheet_to_model(&sample(), "tasa", None, Applicability::Companion).unwrap();
        let file = ModelFile { models: vec![model] };

        for name in ["tasador_test_convert.yaml", "tasador_test_convert.json"] {
            let path = env::temp_dir().join(name);
            write_model_file(&path, &file).unwrap();
            let registry = Registry::load(&path, RegistryPolicy::default()).unwrap();
            assert_eq!(registry.get("tasa").unwrap().intercept, 4.25);
            let _ = fs::remove_file(&path);
        }
    }
}
