// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcrunError {
    /// The process could not be created at all. No run handle exists and no
    /// observer callback will ever fire for this invocation.
    #[error("failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl ProcrunError {
    /// True if this is a failure to create the process.
    pub fn is_spawn(&self) -> bool {
        matches!(self, ProcrunError::Spawn { .. })
    }
}

pub type Result<T> = std::result::Result<T, ProcrunError>;
