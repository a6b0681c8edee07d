use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::task::spawn_blocking;
use tracing::{debug, error, info};

use crate::archive::{archive_files, enforce_retention};
use crate::dedup::deduplicate;
use crate::engine::{EngineError, PipelineConfig, WriterLock};
use crate::intake::{FileIdentifier, FileOutcome, FileTracker};
use crate::models::CanonicalTransaction;
use crate::storage::Storage;
use crate::transform::{parse_file, ParsedFile, TransformError};

/// Counts describing one pipeline run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub run_timestamp: DateTime<Utc>,
    pub files_seen: usize,
    pub files_new: usize,
    pub files_processed: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub records_parsed: usize,
    pub records_invalid: usize,
    pub intra_batch_duplicates: usize,
    pub existing_duplicates: usize,
    pub inserted: usize,
    pub rejected: usize,
    pub archived: usize,
    pub archive_failures: usize,
    pub retention_removed: usize
}

impl RunReport {
    pub fn duplicates(&self) -> usize {
        self.intra_batch_duplicates + self.existing_duplicates
    }
}

/// Files of one run grouped by what happened to them.
#[derive(Default)]
struct Classified {
    processed: Vec<FileIdentifier>,
    empty: Vec<FileIdentifier>,
    failed: Vec<FileIdentifier>,
    candidates: Vec<CanonicalTransaction>
}

/// Runs the file-to-store pipeline: intake, transform, dedup, commit, tracker update,
/// archival and retention, in that order, under the single-writer lock.
pub struct IngestionEngine<S: Storage> {
    storage: Arc<S>,
    config: PipelineConfig
}

impl<S: Storage> IngestionEngine<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            config: PipelineConfig::default()
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Executes one pipeline run.
    ///
    /// File-level problems are counted in the report and never abort the run. The store
    /// commit precedes the tracker save so an interruption between the two only causes
    /// already-stored rows to be filtered again on the next run.
    ///
    /// # Errors
    /// Fails when the writer lock is held elsewhere, the intake directory cannot be
    /// listed, or the store or tracker state cannot be written.
    pub async fn run(&self) -> Result<RunReport, EngineError> {
        let _lock = WriterLock::acquire(&self.config.lock_path())?;
        let timer = Instant::now();

        let mut report = RunReport {
            run_timestamp: Utc::now(),
            ..RunReport::default()
        };

        for directory in [&self.config.intake_dir, &self.config.archive_dir] {
            fs::create_dir_all(directory).map_err(|error| EngineError::io(directory, error))?;
        }

        let mut tracker = FileTracker::load(&self.config.tracker_path);
        let candidates = FileTracker::list_candidates(&self.config.intake_dir, &self.config.extensions)?;
        report.files_seen = candidates.len();

        let (fresh, already_ingested) = if self.config.incremental {
            let partition = tracker.filter_new(candidates);
            (partition.new, partition.already_ingested)
        } else {
            (candidates, Vec::new())
        };
        report.files_new = fresh.len();

        info!("Found {} candidate files, {} new", report.files_seen, report.files_new);

        let parsed = self.parse_files(&fresh).await?;
        let classified = classify(fresh, parsed, &mut report);

        let storage = self.storage.clone();
        let candidates = classified.candidates;
        let (dedup, insert) = spawn_blocking(move || {
            let outcome = deduplicate(storage.as_ref(), candidates)?;
            let counts = (outcome.intra_batch_duplicates, outcome.existing_duplicates);
            let insert = storage.insert_batch(outcome.rows)?;
            Ok::<_, EngineError>((counts, insert))
        }).await??;

        report.intra_batch_duplicates = dedup.0;
        report.existing_duplicates = dedup.1;
        report.inserted = insert.inserted;
        report.rejected = insert.rejected.len();

        //NOTE: Rows are durable at this point. Only now may the files be marked as ingested.
        tracker.commit(&classified.processed, FileOutcome::Processed);
        tracker.commit(&classified.empty, FileOutcome::Skipped);
        tracker.commit(&classified.failed, FileOutcome::Failed);
        tracker.save()?;

        report.files_processed = classified.processed.len();
        report.files_skipped = classified.empty.len() + already_ingested.len();
        report.files_failed = classified.failed.len();

        let to_archive: Vec<PathBuf> = classified.processed.iter()
            .chain(&classified.empty)
            .chain(&already_ingested)
            .map(|file| file.path.clone())
            .collect();

        let archive = archive_files(&to_archive, &self.config.archive_dir, report.run_timestamp);
        report.archived = archive.archived.len();
        report.archive_failures = archive.failed;

        //NOTE: Failed files wait in intake for a retry and must never be pruned before ingestion.
        let pending_retry: Vec<PathBuf> = classified.failed.iter().map(|file| file.path.clone()).collect();
        let retention = enforce_retention(&self.config.intake_dir, &self.config.extensions, self.config.max_files, &pending_retry);
        report.retention_removed = retention.removed.len();

        info!(
            "Run finished in {:?}: {} inserted, {} duplicates, {} rejected, {} files failed",
            timer.elapsed(), report.inserted, report.duplicates(), report.rejected, report.files_failed
        );

        Ok(report)
    }

    /// Clears the persisted tracker state so every file is considered new again.
    pub fn reset_tracker(&self) -> Result<(), EngineError> {
        let _lock = WriterLock::acquire(&self.config.lock_path())?;
        let mut tracker = FileTracker::load(&self.config.tracker_path);
        tracker.reset()?;

        Ok(())
    }

    /// Parses every file on its own blocking worker. Results come back in input order.
    async fn parse_files(&self, files: &[FileIdentifier]) -> Result<Vec<Result<ParsedFile, TransformError>>, EngineError> {
        let workers = files.iter().map(|file| {
            let path = file.path.clone();
            spawn_blocking(move || parse_file(&path))
        });

        join_all(workers).await
            .into_iter()
            .map(|result| result.map_err(EngineError::from))
            .collect()
    }
}

fn classify(files: Vec<FileIdentifier>, parsed: Vec<Result<ParsedFile, TransformError>>, report: &mut RunReport) -> Classified {
    let mut classified = Classified::default();

    for (file, result) in files.into_iter().zip(parsed) {
        match result {
            Ok(parsed) if parsed.is_empty() => {
                debug!("File [{}] contains no records", file.path.display());
                classified.empty.push(file);
            }
            Ok(parsed) => {
                debug!(
                    "File [{}] yielded {} valid of {} records",
                    file.path.display(), parsed.records.len(), parsed.raw_count
                );

                report.records_parsed += parsed.raw_count;
                report.records_invalid += parsed.invalid_count;
                classified.candidates.extend(parsed.records);
                classified.processed.push(file);
            }
            Err(error) => {
                error!("File [{}] could not be ingested and will be retried: {error}", file.path.display());
                classified.failed.push(file);
            }
        }
    }

    classified
}
