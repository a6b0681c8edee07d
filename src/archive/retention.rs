use std::cmp::Reverse;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, Serialize)]
pub struct RetentionReport {
    pub removed: Vec<PathBuf>,
    pub failed: usize
}

/// Keeps at most `max_files` of the most recently modified files per extension in
/// `directory`, deleting the older excess. Subdirectories are never touched, and
/// `protected` files (pending retry) are neither counted nor removed.
///
/// Best-effort: every failure is logged and counted, none is returned.
pub fn enforce_retention(directory: &Path, extensions: &[String], max_files: usize, protected: &[PathBuf]) -> RetentionReport {
    let mut report = RetentionReport::default();

    let entries: Vec<(PathBuf, SystemTime)> = match fs::read_dir(directory) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let metadata = entry.metadata().ok()?;
                let modified = metadata.modified().ok()?;
                metadata.is_file().then(|| (entry.path(), modified))
            })
            .filter(|(path, _)| !protected.contains(path))
            .collect(),
        Err(error) => {
            warn!("Retention skipped, cannot list [{}]: {error}", directory.display());
            return report;
        }
    };

    for extension in extensions {
        let wanted = extension.trim_start_matches('.');

        let mut matching: Vec<&(PathBuf, SystemTime)> = entries.iter()
            .filter(|(path, _)| {
                path.extension()
                    .and_then(|found| found.to_str())
                    .is_some_and(|found| found.eq_ignore_ascii_case(wanted))
            })
            .collect();

        if matching.len() <= max_files {
            debug!("Retention: {} .{wanted} files, limit {max_files}", matching.len());
            continue;
        }

        // Newest first; path breaks ties so the outcome does not depend on listing order.
        matching.sort_by_key(|(path, modified)| (Reverse(*modified), Reverse(path.clone())));

        for (path, _) in matching.into_iter().skip(max_files) {
            match fs::remove_file(path) {
                Ok(()) => {
                    info!("Retention removed [{}]", path.display());
                    report.removed.push(path.clone());
                }
                Err(error) => {
                    warn!("Retention failed to remove [{}]: {error}", path.display());
                    report.failed += 1;
                }
            }
        }
    }

    report
}
