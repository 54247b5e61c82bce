//! Error taxonomy for the rebuild pipeline and its collaborators.
//!
//! The first pipeline run treats every variant as fatal. Runs triggered by
//! watch events catch them at the session boundary and only log.

use std::path::PathBuf;
use thiserror::Error;

use crate::index::IndexError;
use crate::watcher::WatchError;

#[derive(Error, Debug)]
pub enum DevError {
    /// Configuration failed to load or validate.
    #[error("Config error: {reason}")]
    Config { reason: String },

    /// Configuration file is missing entirely.
    #[error("No configuration found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// Schema build or code generation failed.
    #[error("Build error during {stage}: {reason}")]
    Build { stage: &'static str, reason: String },

    /// A full or incremental index operation failed.
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    /// Artifact read or write failed.
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A file watcher could not be set up.
    #[error("Watch error: {0}")]
    Watch(#[from] WatchError),

    #[error("Dev server error: {0}")]
    Server(String),
}

impl DevError {
    pub fn config(reason: impl Into<String>) -> Self {
        DevError::Config {
            reason: reason.into(),
        }
    }

    pub fn build(stage: &'static str, reason: impl Into<String>) -> Self {
        DevError::Build {
            stage,
            reason: reason.into(),
        }
    }

    /// Attribute a collaborator failure to a build stage. Errors already
    /// carrying a stage keep it.
    pub fn in_stage(self, stage: &'static str) -> Self {
        match self {
            DevError::Build { .. } => self,
            other => DevError::build(stage, other.to_string()),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DevError::Io {
            path: path.into(),
            source,
        }
    }

    /// Short category name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            DevError::Config { .. } | DevError::ConfigNotFound { .. } => "ConfigError",
            DevError::Build { .. } => "BuildError",
            DevError::Index(_) => "IndexError",
            DevError::Io { .. } | DevError::Serialization(_) | DevError::Watch(_) => "IOError",
            DevError::Server(_) => "ServerError",
        }
    }
}

pub type DevResult<T> = Result<T, DevError>;
