mod errors;
mod memory_storage;
mod sqlite_storage;
#[cfg(test)]
mod tests;

use std::collections::HashSet;

use crate::models::{CanonicalTransaction, SortKey};
use crate::types::{DateRange, TransactionId};

pub use errors::StorageError;
pub use memory_storage::MemoryStorage;
pub use sqlite_storage::SqliteStorage;

/// Keyset bound for [`Storage::query`]. The bound key itself is never returned.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum KeyBound {
    After(SortKey),
    Before(SortKey)
}

/// Rows in ascending `(date, transaction_id)` order.
///
/// `has_more` is true when further rows exist past the page in the direction of
/// travel: later rows for forward scans, earlier rows for `KeyBound::Before`.
#[derive(Debug, Clone, Default)]
pub struct QueryPage {
    pub rows: Vec<CanonicalTransaction>,
    pub has_more: bool
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct InsertReport {
    pub inserted: usize,
    /// Identifiers refused by the uniqueness constraint.
    pub rejected: Vec<TransactionId>
}

/// Append-only transaction store.
///
/// Implementations must make each `insert_batch` atomic with respect to readers and
/// must enforce `transaction_id` uniqueness on their own, regardless of what the
/// caller already filtered.
pub trait Storage: Send + Sync + 'static {
    /// Returns the subset of `ids` already stored.
    fn existing_ids(&self, ids: &[TransactionId]) -> Result<HashSet<TransactionId>, StorageError>;

    /// Appends rows in one atomic unit. Rows whose identifier already exists are
    /// rejected individually and the remainder is committed.
    fn insert_batch(&self, rows: Vec<CanonicalTransaction>) -> Result<InsertReport, StorageError>;

    fn get(&self, transaction_id: &str) -> Result<Option<CanonicalTransaction>, StorageError>;

    fn query(&self, range: &DateRange, bound: Option<&KeyBound>, limit: usize) -> Result<QueryPage, StorageError>;

    fn count(&self, range: &DateRange) -> Result<u64, StorageError>;

    /// Changes whenever rows are committed; never decreases.
    fn watermark(&self) -> Result<u64, StorageError>;
}
