use std::path::PathBuf;

use thiserror::Error;

use crate::intake::TrackerError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Another ingestion run holds the writer lock at [{0}]")]
    LockUnavailable(PathBuf),
    #[error("I/O error on [{path}]: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error("A blocking worker did not complete: {0}")]
    Join(#[from] tokio::task::JoinError)
}

impl EngineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}
