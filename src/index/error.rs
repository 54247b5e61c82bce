//! Error types for content index operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Index has not been initialized with a schema yet")]
    NotInitialized,

    #[error("Path '{path}' does not belong to any collection")]
    UnknownCollection { path: String },

    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path} as {format}: {reason}")]
    Parse {
        path: String,
        format: String,
        reason: String,
    },

    #[error("Index scan task failed: {0}")]
    Scan(String),
}

pub type IndexResult<T> = Result<T, IndexError>;
