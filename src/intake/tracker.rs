use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::intake::{FileIdentifier, FileOutcome, IngestedFileRecord, TrackerError};

const STATE_VERSION: u32 = 1;

/// Persisted record of which source files have been ingested.
///
/// The tracker is loaded at the start of a pipeline run, mutated in memory with
/// [`FileTracker::commit`], and written back in a single atomic [`FileTracker::save`]
/// once the store has committed. Nothing reaches disk in between, so a crash before
/// `save` leaves the previous state intact and the same files are retried.
#[derive(Debug)]
pub struct FileTracker {
    state_path: PathBuf,
    records: BTreeMap<PathBuf, IngestedFileRecord>
}

/// Result of [`FileTracker::filter_new`].
#[derive(Debug, Default)]
pub struct Partition {
    pub new: Vec<FileIdentifier>,
    pub already_ingested: Vec<FileIdentifier>
}

#[derive(Serialize, Deserialize)]
pub(crate) struct TrackerState {
    version: u32,
    files: Vec<IngestedFileRecord>
}

impl FileTracker {
    /// Loads the tracker from `state_path`.
    ///
    /// A missing file is an empty tracker. An unreadable or corrupted one is also
    /// treated as empty (cold start): the store's uniqueness constraint absorbs the
    /// resulting re-ingestion.
    pub fn load(state_path: impl Into<PathBuf>) -> Self {
        let state_path = state_path.into();

        let records = match Self::read_state(&state_path) {
            Ok(Some(state)) => {
                info!("Loaded tracker state with {} files from [{}]", state.files.len(), state_path.display());
                state.files.into_iter()
                    .map(|record| (record.file.path.clone(), record))
                    .collect()
            }
            Ok(None) => BTreeMap::new(),
            Err(error) => {
                warn!("Tracker state at [{}] is unusable, starting cold: {error}", state_path.display());
                BTreeMap::new()
            }
        };

        Self { state_path, records }
    }

    pub(crate) fn read_state(state_path: &Path) -> Result<Option<TrackerState>, TrackerError> {
        let file = match File::open(state_path) {
            Ok(file) => file,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into())
        };

        let state: TrackerState = serde_json::from_reader(BufReader::new(file))?;

        if state.version != STATE_VERSION {
            return Err(TrackerError::UnsupportedVersion(state.version));
        }

        Ok(Some(state))
    }

    /// Lists files directly inside `directory` whose extension is one of `extensions`,
    /// sorted by path. Files that cannot be read are skipped with a warning.
    pub fn list_candidates(directory: &Path, extensions: &[String]) -> Result<Vec<FileIdentifier>, TrackerError> {
        let mut paths: Vec<PathBuf> = fs::read_dir(directory)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && has_extension(path, extensions))
            .collect();

        paths.sort();

        let mut candidates = Vec::with_capacity(paths.len());

        for path in paths {
            match content_signature(&path) {
                Ok(signature) => candidates.push(FileIdentifier { path, signature }),
                Err(error) => warn!("Skipping unreadable file [{}]: {error}", path.display())
            }
        }

        Ok(candidates)
    }

    /// Splits candidates into files never ingested and files already recorded as
    /// processed or skipped with the same contents. Failed files count as new.
    pub fn filter_new(&self, candidates: Vec<FileIdentifier>) -> Partition {
        let mut partition = Partition::default();

        for candidate in candidates {
            if self.is_ingested(&candidate) {
                partition.already_ingested.push(candidate);
            } else {
                partition.new.push(candidate);
            }
        }

        partition
    }

    fn is_ingested(&self, candidate: &FileIdentifier) -> bool {
        self.records.get(&candidate.path).is_some_and(|record| {
            record.file.signature == candidate.signature && record.outcome != FileOutcome::Failed
        })
    }

    /// Records `outcome` for every file. Held in memory until [`FileTracker::save`].
    pub fn commit(&mut self, files: &[FileIdentifier], outcome: FileOutcome) {
        let ingested_at = Utc::now();

        for file in files {
            debug!("Tracker marks [{}] as {outcome:?}", file.path.display());
            self.records.insert(file.path.clone(), IngestedFileRecord {
                file: file.clone(),
                ingested_at,
                outcome
            });
        }
    }

    /// Writes the full state to a temporary sibling and renames it into place.
    pub fn save(&self) -> Result<(), TrackerError> {
        if let Some(parent) = self.state_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let state = TrackerState {
            version: STATE_VERSION,
            files: self.records.values().cloned().collect()
        };

        let tmp_path = self.state_path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(&state)?;
        {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(tmp_path, &self.state_path)?;

        debug!("Saved tracker state with {} files", self.records.len());
        Ok(())
    }

    /// Forgets every file and removes the persisted state.
    pub fn reset(&mut self) -> Result<(), TrackerError> {
        self.records.clear();

        match fs::remove_file(&self.state_path) {
            Ok(()) => {}
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => return Err(error.into())
        }

        info!("Tracker state at [{}] reset", self.state_path.display());
        Ok(())
    }

    pub fn get(&self, path: &Path) -> Option<&IngestedFileRecord> {
        self.records.get(path)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(extension) = path.extension().and_then(|extension| extension.to_str()) else {
        return false
    };

    extensions.iter().any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(extension))
}

fn content_signature(path: &Path) -> io::Result<String> {
    let mut hasher = Sha256::new();
    io::copy(&mut BufReader::new(File::open(path)?), &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
