use std::path::PathBuf;

use thiserror::Error;

/// Failures that discard a whole file. Per-record problems never surface here.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Unable to read [{path}]: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error
    },
    #[error("Unsupported file extension for [{0}]")]
    UnsupportedShape(PathBuf),
    #[error("JSON structure error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV structure error: {0}")]
    Csv(#[from] csv::Error),
    #[error("CSV header is missing the [{0}] column")]
    MissingColumn(&'static str)
}
