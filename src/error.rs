use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum RecoverError {
    #[error("Recover error: {0}")]
    Generic(String),
    #[error(transparent)]
    Expected(#[from] RecoverExpectedError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecoverExpectedError {
    #[error("{0}")]
    Generic(String),
    #[error("Track does not exist: {id}")]
    TrackNotFound { id: String },
    #[error("Track {id} has no location")]
    MissingLocation { id: String },
    #[error("Playlist {pid} is nested deeper than {max_depth} levels")]
    HierarchyTooDeep { pid: String, max_depth: usize },
    #[error("Playlist parent references form a cycle: {}", pids.join(" -> "))]
    HierarchyCycle { pids: Vec<String> },
    #[error("Malformed library document: {message}")]
    MalformedDocument { message: String },
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },
}

impl RecoverExpectedError {
    pub fn malformed(message: impl Into<String>) -> Self {
        RecoverExpectedError::MalformedDocument {
            message: message.into(),
        }
    }

    /// True for the structural failures raised while rebuilding the playlist tree.
    pub fn is_hierarchy_error(&self) -> bool {
        matches!(
            self,
            RecoverExpectedError::HierarchyTooDeep { .. } | RecoverExpectedError::HierarchyCycle { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, RecoverError>;
