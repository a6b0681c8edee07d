use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Tracker I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Tracker state error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Tracker state version [{0}] is not supported")]
    UnsupportedVersion(u32)
}
