mod schema;

pub use schema::{BatchConfig, Config};

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::Registry;

/// Get the config directory path (~/.config/tasador/)
pub fn get_config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("tasador"))
}

/// Get the default config file path (~/.config/tasador/config.yaml)
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.yaml"))
}

/// Load configuration from a YAML file
///
/// # Arguments
///
/// * `path` - Optional path to config file. If None, uses default path (~/.config/tasador/config.yaml)
///
/// The `models` path is resolved against the directory holding the config
/// file when it is relative.
///
/// # Errors
///
/// Returns an error if:
/// - The config file does not exist
/// - The config file cannot be read
/// - The YAML cannot be parsed
pub fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => p,
        None => get_config_path()?,
    };

    if !config_path.exists() {
        anyhow::bail!(
            "Config file not found at {}. Create ~/.config/tasador/config.yaml or pass --config",
            config_path.display()
        );
    }

    let config_content = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;

    let mut config: Config = serde_saphyr::from_str(&config_content)
        .with_context(|| format!("Failed to parse config: invalid YAML in {}", config_path.display()))?;

    if config.models.is_relative() {
        let base = config_path.parent().unwrap_or_else(|| Path::new("."));
        config.models = base.join(&config.models);
    }

    tracing::debug!(
        path = %config_path.display(),
        models = %config.models.display(),
        "config loaded"
    );
    Ok(config)
}

/// Build the model registry described by a loaded config.
pub fn load_registry(config: &Config) -> Result<Registry> {
    Registry::load(&config.models, config.policy.clone())
        .with_context(|| format!("Failed to load models from {}", config.models.display()))
}
