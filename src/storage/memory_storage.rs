use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::sync::{RwLock, RwLockReadGuard};

use chrono::NaiveDate;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::warn;

use crate::models::{CanonicalTransaction, SortKey};
use crate::storage::{InsertReport, KeyBound, QueryPage, Storage, StorageError};
use crate::types::{DateRange, TransactionId};

/// In-process store for tests and throwaway runs.
///
/// `index` answers identifier lookups without touching the ordered map. Readers only
/// ever go through `rows`, and a batch holds the `rows` write lock for its whole
/// duration, so a partially applied batch is never observable.
pub struct MemoryStorage {
    index: DashMap<TransactionId, NaiveDate>,
    rows: RwLock<BTreeMap<SortKey, CanonicalTransaction>>
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            index: DashMap::new(),
            rows: RwLock::new(BTreeMap::new())
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<SortKey, CanonicalTransaction>>, StorageError> {
        self.rows.read().map_err(|_| StorageError::Poisoned)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn existing_ids(&self, ids: &[TransactionId]) -> Result<HashSet<TransactionId>, StorageError> {
        Ok(ids.iter().filter(|id| self.index.contains_key(*id)).cloned().collect())
    }

    fn insert_batch(&self, rows: Vec<CanonicalTransaction>) -> Result<InsertReport, StorageError> {
        let mut stored = self.rows.write().map_err(|_| StorageError::Poisoned)?;
        let mut report = InsertReport::default();

        for row in rows {
            match self.index.entry(row.transaction_id.clone()) {
                Entry::Occupied(_) => {
                    warn!("Uniqueness backstop rejected transaction [{}]; dedup should have excluded it", row.transaction_id);
                    report.rejected.push(row.transaction_id);
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(row.date);
                    stored.insert(row.sort_key(), row);
                    report.inserted += 1;
                }
            }
        }

        Ok(report)
    }

    fn get(&self, transaction_id: &str) -> Result<Option<CanonicalTransaction>, StorageError> {
        let Some(date) = self.index.get(transaction_id).map(|entry| *entry.value()) else {
            return Ok(None)
        };

        let rows = self.read()?;
        Ok(rows.get(&SortKey::new(date, transaction_id)).cloned())
    }

    fn query(&self, range: &DateRange, bound: Option<&KeyBound>, limit: usize) -> Result<QueryPage, StorageError> {
        let rows = self.read()?;

        let mut selected: Vec<CanonicalTransaction> = match bound {
            Some(KeyBound::Before(key)) => rows
                .range((Bound::Unbounded, Bound::Excluded(key)))
                .rev()
                .skip_while(|(candidate, _)| range.end.is_some_and(|end| candidate.date > end))
                .take_while(|(candidate, _)| range.start.is_none_or(|start| candidate.date >= start))
                .take(limit + 1)
                .map(|(_, row)| row.clone())
                .collect(),
            other => {
                let lower = match other {
                    Some(KeyBound::After(key)) => Bound::Excluded(key),
                    _ => Bound::Unbounded
                };

                rows.range((lower, Bound::Unbounded))
                    .skip_while(|(candidate, _)| range.start.is_some_and(|start| candidate.date < start))
                    .take_while(|(candidate, _)| range.end.is_none_or(|end| candidate.date <= end))
                    .take(limit + 1)
                    .map(|(_, row)| row.clone())
                    .collect()
            }
        };

        let has_more = selected.len() > limit;
        selected.truncate(limit);

        if matches!(bound, Some(KeyBound::Before(_))) {
            selected.reverse();
        }

        Ok(QueryPage { rows: selected, has_more })
    }

    fn count(&self, range: &DateRange) -> Result<u64, StorageError> {
        let rows = self.read()?;
        Ok(rows.keys().filter(|key| range.contains(key.date)).count() as u64)
    }

    fn watermark(&self) -> Result<u64, StorageError> {
        Ok(self.read()?.len() as u64)
    }
}
