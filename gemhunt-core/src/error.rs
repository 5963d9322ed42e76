use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors. Everything a collaborator can get wrong is handled as a
/// `Lookup` and never ends up here; only file I/O aborts a job.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid option: {0}")]
    InvalidOption(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
