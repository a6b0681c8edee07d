use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::{CanonicalTransaction, FlatRecord, NestedRecord, RawRecord};
use crate::transform::{FileShape, TransformError};

const ID_COLUMN: &str = "transaction_id";

/// Valid rows of one file, in file order, plus how many raw records were dropped.
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    pub records: Vec<CanonicalTransaction>,
    pub raw_count: usize,
    pub invalid_count: usize
}

impl ParsedFile {
    /// True when the file held no records at all, valid or not.
    pub fn is_empty(&self) -> bool {
        self.raw_count == 0
    }

    fn accept(&mut self, raw: RawRecord) {
        self.raw_count += 1;

        match raw.normalize() {
            Ok(transaction) => self.records.push(transaction),
            Err(error) => {
                self.invalid_count += 1;
                warn!("{error}");
            }
        }
    }

    fn reject(&mut self, reason: impl std::fmt::Display) {
        self.raw_count += 1;
        self.invalid_count += 1;
        warn!("Record could not be decoded: {reason}");
    }
}

/// Reads and parses one file, picking the shape from its extension.
///
/// # Errors
/// Returns `TransformError` when the file cannot be read or its overall structure is
/// unusable. Individual bad records are counted in `ParsedFile::invalid_count` instead.
pub fn parse_file(path: &Path) -> Result<ParsedFile, TransformError> {
    let shape = FileShape::from_path(path)
        .ok_or_else(|| TransformError::UnsupportedShape(path.to_path_buf()))?;

    let bytes = fs::read(path).map_err(|source| TransformError::Unreadable {
        path: path.to_path_buf(),
        source
    })?;

    let parsed = parse_bytes(&bytes, shape)?;
    debug!("Parsed [{}]: {} records, {} invalid", path.display(), parsed.raw_count, parsed.invalid_count);

    Ok(parsed)
}

/// Parses raw bytes of a single file. Identical input always yields identical output.
pub fn parse_bytes(bytes: &[u8], shape: FileShape) -> Result<ParsedFile, TransformError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(ParsedFile::default());
    }

    match shape {
        FileShape::Nested => parse_nested(bytes),
        FileShape::Flat => parse_flat(bytes)
    }
}

fn parse_nested(bytes: &[u8]) -> Result<ParsedFile, TransformError> {
    let values: Vec<Value> = serde_json::from_slice(bytes)?;
    let mut parsed = ParsedFile::default();

    for value in values {
        match serde_json::from_value::<NestedRecord>(value) {
            Ok(record) => parsed.accept(RawRecord::Nested(record)),
            Err(error) => parsed.reject(error)
        }
    }

    Ok(parsed)
}

fn parse_flat(bytes: &[u8]) -> Result<ParsedFile, TransformError> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(bytes);

    if !reader.headers()?.iter().any(|header| header == ID_COLUMN) {
        return Err(TransformError::MissingColumn(ID_COLUMN));
    }

    let mut parsed = ParsedFile::default();

    for result in reader.deserialize::<FlatRecord>() {
        match result {
            Ok(record) => parsed.accept(RawRecord::Flat(record)),
            Err(error) => parsed.reject(error)
        }
    }

    Ok(parsed)
}
