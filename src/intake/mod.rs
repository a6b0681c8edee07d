mod errors;
mod tracker;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use errors::TrackerError;
pub use tracker::{FileTracker, Partition};

/// A source file as seen at listing time: where it is and what it contained.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct FileIdentifier {
    pub path: PathBuf,
    /// Hex encoded SHA-256 of the file contents.
    pub signature: String
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOutcome {
    Processed,
    Failed,
    Skipped
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct IngestedFileRecord {
    pub file: FileIdentifier,
    pub ingested_at: DateTime<Utc>,
    pub outcome: FileOutcome
}
