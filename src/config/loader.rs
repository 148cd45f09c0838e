// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{RawConfigFile, RunnerConfig};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw model.
///
/// This only performs TOML deserialization; use [`load_and_validate`] to get
/// a checked [`RunnerConfig`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<RunnerConfig> {
    let raw_config = load_from_path(&path)?;
    RunnerConfig::try_from(raw_config)
}

/// Resolve the effective config for the front end.
///
/// - An explicit path must exist.
/// - Without one, `Procrun.toml` in the working directory is used when
///   present, otherwise built-in defaults.
pub fn resolve_config(explicit: Option<&Path>) -> Result<RunnerConfig> {
    if let Some(path) = explicit {
        return load_and_validate(path);
    }

    let default_path = default_config_path();
    if default_path.is_file() {
        debug!(path = ?default_path, "loading default config file");
        load_and_validate(default_path)
    } else {
        debug!("no config file found; using built-in defaults");
        Ok(RunnerConfig::default())
    }
}

/// Default config location: `Procrun.toml` in the working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Procrun.toml")
}
