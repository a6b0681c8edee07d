mod errors;
mod parser;
#[cfg(test)]
mod tests;

use std::path::Path;

pub use errors::TransformError;
pub use parser::{parse_bytes, parse_file, ParsedFile};

/// Layout of a source file, decided by its extension.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FileShape {
    /// JSON array of objects with `customer` and `metadata` sub-objects.
    Nested,
    /// CSV with a header row and one column per canonical field.
    Flat
}

impl FileShape {
    pub fn from_path(path: &Path) -> Option<FileShape> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();

        match extension.as_str() {
            "json" => Some(FileShape::Nested),
            "csv" => Some(FileShape::Flat),
            _ => None
        }
    }
}
