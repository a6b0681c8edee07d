use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Stored row [{transaction_id}] is corrupt: {reason}")]
    Corrupt {
        transaction_id: String,
        reason: String
    },
    #[error("Storage lock was poisoned by a panicked writer")]
    Poisoned
}

impl StorageError {
    pub fn corrupt(transaction_id: &str, reason: impl ToString) -> Self {
        Self::Corrupt {
            transaction_id: transaction_id.to_string(),
            reason: reason.to_string()
        }
    }
}
