mod archiver;
mod retention;

pub use archiver::{archive_files, archive_name, ArchiveReport};
pub use retention::{enforce_retention, RetentionReport};
