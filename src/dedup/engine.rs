use std::collections::HashSet;

use tracing::{debug, info};

use crate::models::CanonicalTransaction;
use crate::storage::{Storage, StorageError};
use crate::types::TransactionId;

/// Rows that are genuinely new, with counts of what was filtered out.
#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    pub rows: Vec<CanonicalTransaction>,
    pub intra_batch_duplicates: usize,
    pub existing_duplicates: usize
}

impl DedupOutcome {
    pub fn total_duplicates(&self) -> usize {
        self.intra_batch_duplicates + self.existing_duplicates
    }
}

/// Keeps the first occurrence of every `transaction_id` in encounter order.
///
/// Returns the survivors and the number of dropped repeats.
pub fn remove_intra_batch_duplicates(candidates: Vec<CanonicalTransaction>) -> (Vec<CanonicalTransaction>, usize) {
    let mut seen = HashSet::with_capacity(candidates.len());
    let mut survivors = Vec::with_capacity(candidates.len());
    let mut dropped = 0;

    for candidate in candidates {
        if seen.insert(candidate.transaction_id.clone()) {
            survivors.push(candidate);
        } else {
            debug!("Dropping repeated transaction [{}] within batch", candidate.transaction_id);
            dropped += 1;
        }
    }

    (survivors, dropped)
}

/// Removes candidates whose identifier is already stored, using a single
/// membership query for the whole batch.
pub fn exclude_existing<S: Storage + ?Sized>(storage: &S, candidates: Vec<CanonicalTransaction>) -> Result<(Vec<CanonicalTransaction>, usize), StorageError> {
    if candidates.is_empty() {
        return Ok((candidates, 0));
    }

    let ids: Vec<TransactionId> = candidates.iter().map(|candidate| candidate.transaction_id.clone()).collect();
    let existing = storage.existing_ids(&ids)?;

    if existing.is_empty() {
        return Ok((candidates, 0));
    }

    let before = candidates.len();
    let fresh: Vec<_> = candidates.into_iter()
        .filter(|candidate| !existing.contains(&candidate.transaction_id))
        .collect();

    let removed = before - fresh.len();
    Ok((fresh, removed))
}

/// Runs both dedup stages over the union of one run's candidates.
pub fn deduplicate<S: Storage + ?Sized>(storage: &S, candidates: Vec<CanonicalTransaction>) -> Result<DedupOutcome, StorageError> {
    let (unique, intra_batch_duplicates) = remove_intra_batch_duplicates(candidates);
    let (rows, existing_duplicates) = exclude_existing(storage, unique)?;

    info!("Dedup kept {} rows ({intra_batch_duplicates} repeated in batch, {existing_duplicates} already stored)", rows.len());

    Ok(DedupOutcome {
        rows,
        intra_batch_duplicates,
        existing_duplicates
    })
}
