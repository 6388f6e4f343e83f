// src/errors.rs

//! Crate-wide error type and `Result` alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipekitError {
    /// A task descriptor could not be turned into a placeable unit.
    #[error("Invalid task specification: {0}")]
    InvalidSpecification(String),

    /// No unit accepts the `source` tag, so no chain can ever start.
    #[error("No source units: at least one task must accept the \"source\" type")]
    NoSourceUnits,

    /// A unit's `run` failed. The batch stops here; records for earlier
    /// pipelines stay on the executor.
    #[error("Task '{task}' failed in pipeline {pipeline}: {source}")]
    TaskExecution {
        task: String,
        pipeline: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("Could not fingerprint task input: {0}")]
    Fingerprint(#[from] crate::fingerprint::FingerprintError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PipekitError>;
