use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::Serialize;
use tracing::{debug, warn};

use crate::models::CanonicalTransaction;
use crate::pagination::{Cursor, Direction, PaginationError};
use crate::storage::{KeyBound, Storage};
use crate::types::DateRange;

pub const MAX_PAGE_LIMIT: usize = 1000;

#[derive(Debug, Clone)]
pub struct PageRequest {
    pub range: DateRange,
    pub cursor: Option<String>,
    pub limit: usize
}

#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub data: Vec<CanonicalTransaction>,
    pub next_cursor: Option<String>,
    pub prev_cursor: Option<String>,
    pub total: u64
}

impl Page {
    fn empty(total: u64) -> Self {
        Self {
            data: Vec::new(),
            next_cursor: None,
            prev_cursor: None,
            total
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaginatorConfig {
    pub count_cache_capacity: u64,
    pub count_cache_ttl: Duration
}

impl Default for PaginatorConfig {
    fn default() -> Self {
        Self {
            count_cache_capacity: 1024,
            count_cache_ttl: Duration::from_secs(60)
        }
    }
}

impl PaginatorConfig {
    pub fn with_count_cache_capacity(mut self, capacity: u64) -> Self {
        self.count_cache_capacity = capacity;
        self
    }

    pub fn with_count_cache_ttl(mut self, ttl: Duration) -> Self {
        self.count_cache_ttl = ttl;
        self
    }
}

/// Keyset pagination over a [`Storage`] in `(date, transaction_id)` order.
///
/// Reads only committed state and takes no writer lock. Filter totals are cached per
/// date range and store watermark, so a commit naturally invalidates them.
pub struct Paginator<S: Storage> {
    storage: Arc<S>,
    counts: Cache<(DateRange, u64), u64>
}

impl<S: Storage> Paginator<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self::with_config(storage, PaginatorConfig::default())
    }

    pub fn with_config(storage: Arc<S>, config: PaginatorConfig) -> Self {
        let counts = Cache::builder()
            .max_capacity(config.count_cache_capacity)
            .time_to_live(config.count_cache_ttl)
            .build();

        Self { storage, counts }
    }

    /// Serves one page.
    ///
    /// Forward pages start strictly after the cursor key (or at the start of the
    /// filtered set), backward pages end strictly before it. A cursor that cannot be
    /// decoded or no longer points into the filtered set restarts from the beginning.
    ///
    /// # Errors
    /// Only storage failures are returned.
    pub async fn page(&self, request: &PageRequest) -> Result<Page, PaginationError> {
        let limit = request.limit.clamp(1, MAX_PAGE_LIMIT);
        let range = request.range;

        if range.is_empty() {
            return Ok(Page::empty(0));
        }

        let total = self.total(&range).await?;

        if total == 0 {
            return Ok(Page::empty(0));
        }

        let cursor = match request.cursor.as_deref() {
            Some(token) => self.resolve_cursor(token, &range)?,
            None => None
        };

        let page = match &cursor {
            Some(Cursor { direction: Direction::Backward, key }) => {
                let result = self.storage.query(&range, Some(&KeyBound::Before(key.clone())), limit)?;

                // The cursor row itself lies after this page, so a next page always exists.
                Page {
                    next_cursor: result.rows.last().map(|row| Cursor::forward(row.sort_key()).encode()),
                    prev_cursor: result.rows.first()
                        .filter(|_| result.has_more)
                        .map(|row| Cursor::backward(row.sort_key()).encode()),
                    data: result.rows,
                    total
                }
            }
            forward => {
                let bound = forward.as_ref().map(|cursor| KeyBound::After(cursor.key.clone()));
                let result = self.storage.query(&range, bound.as_ref(), limit)?;

                Page {
                    next_cursor: result.rows.last()
                        .filter(|_| result.has_more)
                        .map(|row| Cursor::forward(row.sort_key()).encode()),
                    prev_cursor: result.rows.first()
                        .filter(|_| forward.is_some())
                        .map(|row| Cursor::backward(row.sort_key()).encode()),
                    data: result.rows,
                    total
                }
            }
        };

        debug!("Served page of {} rows (total {total})", page.data.len());
        Ok(page)
    }

    async fn total(&self, range: &DateRange) -> Result<u64, PaginationError> {
        let key = (*range, self.storage.watermark()?);

        if let Some(total) = self.counts.get(&key).await {
            return Ok(total);
        }

        let total = self.storage.count(range)?;
        self.counts.insert(key, total).await;

        Ok(total)
    }

    /// Decodes a cursor and checks that its key is a stored row inside `range`.
    fn resolve_cursor(&self, token: &str, range: &DateRange) -> Result<Option<Cursor>, PaginationError> {
        let cursor = match Cursor::decode(token) {
            Ok(cursor) => cursor,
            Err(error) => {
                warn!("Ignoring invalid cursor, restarting from the first page: {error}");
                return Ok(None);
            }
        };

        if !range.contains(cursor.key.date) {
            warn!("Cursor date [{}] is outside the active filter, restarting from the first page", cursor.key.date);
            return Ok(None);
        }

        let stored = self.storage.get(&cursor.key.transaction_id)?;

        if stored.is_none_or(|row| row.date != cursor.key.date) {
            warn!("Cursor references unknown row [{}], restarting from the first page", cursor.key.transaction_id);
            return Ok(None);
        }

        Ok(Some(cursor))
    }
}
