use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("Cursor is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("Cursor payload is malformed: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("Cursor version [{0}] is not supported")]
    UnsupportedVersion(u32)
}

/// Only storage failures escape a page request; cursor problems are absorbed.
#[derive(Debug, Error)]
pub enum PaginationError {
    #[error(transparent)]
    Storage(#[from] StorageError)
}
