use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Clone, Default, Serialize)]
pub struct ArchiveReport {
    /// Destination of every file that was moved.
    pub archived: Vec<PathBuf>,
    pub failed: usize
}

/// Moves each file into `archive_dir`, prefixed with the run timestamp.
///
/// Best-effort: a file that cannot be moved is logged and left in place.
pub fn archive_files(files: &[PathBuf], archive_dir: &Path, run_timestamp: DateTime<Utc>) -> ArchiveReport {
    let mut report = ArchiveReport::default();

    if files.is_empty() {
        return report;
    }

    if let Err(error) = fs::create_dir_all(archive_dir) {
        error!("Unable to create archive directory [{}]: {error}", archive_dir.display());
        report.failed = files.len();
        return report;
    }

    for source in files {
        let Some(file_name) = source.file_name().and_then(|name| name.to_str()) else {
            error!("Cannot archive [{}]: file name is not valid UTF-8", source.display());
            report.failed += 1;
            continue;
        };

        let destination = free_destination(archive_dir, &archive_name(run_timestamp, file_name));

        match move_file(source, &destination) {
            Ok(()) => {
                info!("Archived [{}] to [{}]", source.display(), destination.display());
                report.archived.push(destination);
            }
            Err(error) => {
                error!("Failed to archive [{}]: {error}", source.display());
                report.failed += 1;
            }
        }
    }

    report
}

/// `<YYYYmmdd_HHMMSS>_<file name>`; sorts chronologically across runs.
pub fn archive_name(run_timestamp: DateTime<Utc>, file_name: &str) -> String {
    format!("{}_{file_name}", run_timestamp.format(TIMESTAMP_FORMAT))
}

fn free_destination(archive_dir: &Path, name: &str) -> PathBuf {
    let candidate = archive_dir.join(name);

    if !candidate.exists() {
        return candidate;
    }

    let path = Path::new(name);
    let stem = path.file_stem().and_then(|stem| stem.to_str()).unwrap_or(name);
    let extension = path.extension().and_then(|extension| extension.to_str());

    (1..)
        .map(|suffix| match extension {
            Some(extension) => archive_dir.join(format!("{stem}_{suffix}.{extension}")),
            None => archive_dir.join(format!("{stem}_{suffix}"))
        })
        .find(|candidate| !candidate.exists())
        .unwrap_or(candidate)
}

fn move_file(source: &Path, destination: &Path) -> io::Result<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        // Rename cannot cross filesystems; fall back to copy and delete.
        Err(_) => {
            fs::copy(source, destination)?;
            fs::remove_file(source)
        }
    }
}
