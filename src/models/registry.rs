use std::fs;
use std::path::{Path, PathBuf};

use super::definition::ModelDefinition;
use super::policy::{CompanionPolicy, RegistryPolicy};
use super::schema::{ModelConfig, ModelFile, ModelRole};
use super::validation::build_models;
use crate::error::{ConfigError, EvaluationError, NoModelMatch, ScoreError};
use crate::scoring::{score, PropertyRecord, ScoringResult};

/// Loaded models, immutable after construction.
///
/// Built once at startup and passed by reference to everything that scores.
#[derive(Debug, Clone)]
pub struct Registry {
    /// Load order; selection scans in this order
    models: Vec<ModelDefinition>,
    policy: RegistryPolicy,
}

/// Scores produced for one record: the population-selected model plus any
/// companions the policy (or the caller) asked for.
///
/// A companion that cannot score the record does not discard the primary
/// result; its error is kept in `companion_errors` instead.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub primary: ScoringResult,
    pub companions: Vec<ScoringResult>,
    pub companion_errors: Vec<ScoreError>,
}

impl Evaluation {
    /// Every wanted model produced a score.
    pub fn is_complete(&self) -> bool {
        self.companion_errors.is_empty()
    }

    /// Companion failures joined for a single error cell, if any.
    pub fn companion_error_message(&self) -> Option<String> {
        if self.is_complete() {
            return None;
        }
        Some(
            self.companion_errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join(" | "),
        )
    }
}

impl Registry {
    /// Build a registry from already parsed model configs.
    pub fn from_models(
        configs: Vec<ModelConfig>,
        policy: RegistryPolicy,
    ) -> Result<Self, ConfigError> {
        let models = build_models(configs, &policy).map_err(ConfigError::Invalid)?;
        Ok(Self { models, policy })
    }

    /// Load models from a single YAML/JSON file or from every model file
    /// in a directory (sorted by file name).
    pub fn load(source: &Path, policy: RegistryPolicy) -> Result<Self, ConfigError> {
        let files = model_files(source)?;
        let mut configs = Vec::new();
        for file in &files {
            let parsed = read_model_file(file)?;
            tracing::debug!(
                path = %file.display(),
                models = parsed.models.len(),
                "read model file"
            );
            configs.extend(parsed.models);
        }

        let registry = Self::from_models(configs, policy)?;
        tracing::info!(
            models = registry.models.len(),
            files = files.len(),
            "model registry loaded"
        );
        Ok(registry)
    }

    pub fn policy(&self) -> &RegistryPolicy {
        &self.policy
    }

    pub fn models(&self) -> &[ModelDefinition] {
        &self.models
    }

    pub fn get(&self, id: &str) -> Option<&ModelDefinition> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn selectors(&self) -> impl Iterator<Item = &ModelDefinition> {
        self.models.iter().filter(|m| m.role == ModelRole::Selector)
    }

    pub fn companions(&self) -> impl Iterator<Item = &ModelDefinition> {
        self.models.iter().filter(|m| m.role == ModelRole::Companion)
    }

    /// Pick the selector model whose `[min, max)` range covers `population`.
    /// With overlapping ranges allowed, the first in load order wins.
    pub fn select(&self, population: u64) -> Result<&ModelDefinition, NoModelMatch> {
        self.selectors()
            .find(|m| m.population.is_some_and(|r| r.contains(population)))
            .ok_or(NoModelMatch { population })
    }

    /// Select, validate and score a record, then score companions per policy.
    ///
    /// `requested` names companion models to score under
    /// [`CompanionPolicy::Independent`]; under `Always` every companion is
    /// scored and `requested` only has to name companion models.
    pub fn evaluate(
        &self,
        record: &PropertyRecord,
        requested: &[String],
    ) -> Result<Evaluation, EvaluationError> {
        self.check_requested(requested)?;

        let model = self.select(record.population)?;
        let primary = score(record, model, &self.policy)?;

        let mut companions = Vec::new();
        let mut companion_errors = Vec::new();
        for companion in self.companions() {
            let wanted = match self.policy.companions {
                CompanionPolicy::Always => true,
                CompanionPolicy::Independent => requested.iter().any(|id| *id == companion.id),
            };
            if !wanted {
                continue;
            }
            match score(record, companion, &self.policy) {
                Ok(result) => companions.push(result),
                Err(err) => {
                    tracing::debug!(model = %companion.id, error = %err, "companion not scored");
                    companion_errors.push(err);
                }
            }
        }

        Ok(Evaluation {
            primary,
            companions,
            companion_errors,
        })
    }

    /// Requested ids must name loaded companion models.
    pub fn check_requested(&self, requested: &[String]) -> Result<(), EvaluationError> {
        for id in requested {
            match self.get(id) {
                None => return Err(EvaluationError::UnknownModel(id.clone())),
                Some(m) if m.role != ModelRole::Companion => {
                    return Err(EvaluationError::NotACompanion(id.clone()))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

fn model_files(source: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    if !source.is_dir() {
        if !source.exists() {
            return Err(ConfigError::Io {
                path: source.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
            });
        }
        return Ok(vec![source.to_path_buf()]);
    }

    let mut files = Vec::new();
    for ext in ["yaml", "yml", "json"] {
        let pattern = source.join(format!("*.{}", ext)).display().to_string();
        let paths = glob::glob(&pattern).map_err(|e| ConfigError::Glob {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
        files.extend(paths.filter_map(|entry| entry.ok()));
    }

    if files.is_empty() {
        return Err(ConfigError::NoModelFiles(source.to_path_buf()));
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn read_model_file(path: &Path) -> Result<ModelFile, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let parsed = if is_json {
        serde_json::from_str(&content).map_err(|e| e.to_string())
    } else {
        serde_saphyr::from_str(&content).map_err(|e| e.to_string())
    };

    parsed.map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })
}
