use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_FILES: usize = 10;

/// Directories and policies for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub intake_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub tracker_path: PathBuf,
    /// Accepted extensions, compared case-insensitively and without the leading dot.
    pub extensions: Vec<String>,
    /// Files kept per extension in the intake directory after a run.
    pub max_files: usize,
    /// When false every candidate is re-read regardless of tracker state.
    pub incremental: bool
}

impl PipelineConfig {
    /// Lays the intake, archive and tracker state out under one data directory.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();

        Self {
            intake_dir: data_dir.join("incoming"),
            archive_dir: data_dir.join("archive"),
            tracker_path: data_dir.join("ingested_files.json"),
            extensions: vec!["csv".to_string(), "json".to_string()],
            max_files: DEFAULT_MAX_FILES,
            incremental: true
        }
    }

    pub fn with_intake_dir(mut self, intake_dir: impl Into<PathBuf>) -> Self {
        self.intake_dir = intake_dir.into();
        self
    }

    pub fn with_archive_dir(mut self, archive_dir: impl Into<PathBuf>) -> Self {
        self.archive_dir = archive_dir.into();
        self
    }

    pub fn with_tracker_path(mut self, tracker_path: impl Into<PathBuf>) -> Self {
        self.tracker_path = tracker_path.into();
        self
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn with_incremental(mut self, incremental: bool) -> Self {
        self.incremental = incremental;
        self
    }

    /// The writer lock lives next to the tracker state it protects.
    pub fn lock_path(&self) -> PathBuf {
        self.tracker_path.with_extension("lock")
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new("data")
    }
}
