//! Errors raised while loading or validating ABIs.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AbiError {
    #[error("ABI JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot derive an account name from {path}: {reason}")]
    InvalidFileName { path: PathBuf, reason: String },

    #[error("Type '{type_name}' used by {context} is not defined")]
    UnknownType { context: String, type_name: String },

    #[error("Invalid ABI: {0}")]
    Invalid(String),
}

impl AbiError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
