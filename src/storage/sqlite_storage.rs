use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::models::{CanonicalTransaction, TransactionStatus, TransactionType};
use crate::storage::{InsertReport, KeyBound, QueryPage, Storage, StorageError};
use crate::types::{DateRange, TransactionId};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS transactions (
        transaction_id   TEXT PRIMARY KEY NOT NULL,
        amount           TEXT NOT NULL,
        currency         TEXT NOT NULL,
        transaction_type TEXT NOT NULL,
        status           TEXT NOT NULL,
        date             TEXT NOT NULL,
        customer_id      TEXT NOT NULL,
        customer_name    TEXT NOT NULL,
        customer_email   TEXT NOT NULL,
        ip_address       TEXT NOT NULL,
        device           TEXT NOT NULL,
        location         TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date, transaction_id);
";

const COLUMNS: &str = "transaction_id, amount, currency, transaction_type, status, date, \
                       customer_id, customer_name, customer_email, ip_address, device, location";

/// SQLite parameter limit is far higher, this keeps statements small.
const MEMBERSHIP_CHUNK: usize = 500;
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Persistent store backed by a local SQLite database.
///
/// Dates are stored as `YYYY-MM-DD` text so lexical order equals calendar order, and
/// amounts as decimal text so they round-trip exactly.
pub struct SqliteStorage {
    connection: Mutex<Connection>
}

impl SqliteStorage {
    /// Opens (or creates) the database file. Failure here is fatal for callers.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let connection = Connection::open(path)?;
        connection.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        connection.busy_timeout(Duration::from_secs(5))?;

        info!("Opened transaction store at [{}]", path.display());
        Self::initialize(connection)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(connection: Connection) -> Result<Self, StorageError> {
        connection.execute_batch(SCHEMA)?;

        Ok(Self {
            connection: Mutex::new(connection)
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.connection.lock().map_err(|_| StorageError::Poisoned)
    }
}

impl Storage for SqliteStorage {
    fn existing_ids(&self, ids: &[TransactionId]) -> Result<HashSet<TransactionId>, StorageError> {
        let connection = self.lock()?;
        let mut existing = HashSet::new();

        for chunk in ids.chunks(MEMBERSHIP_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!("SELECT transaction_id FROM transactions WHERE transaction_id IN ({placeholders})");
            let mut statement = connection.prepare(&sql)?;
            let rows = statement.query_map(params_from_iter(chunk.iter()), |row| row.get::<_, String>(0))?;

            for row in rows {
                existing.insert(row?);
            }
        }

        Ok(existing)
    }

    fn insert_batch(&self, rows: Vec<CanonicalTransaction>) -> Result<InsertReport, StorageError> {
        let mut connection = self.lock()?;
        let transaction = connection.transaction()?;
        let mut report = InsertReport::default();

        {
            let mut statement = transaction.prepare_cached(&format!(
                "INSERT INTO transactions ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12) \
                 ON CONFLICT(transaction_id) DO NOTHING"
            ))?;

            for row in &rows {
                let changed = statement.execute(params![
                    row.transaction_id,
                    row.amount.to_string(),
                    row.currency,
                    row.transaction_type.as_str(),
                    row.status.as_str(),
                    row.date.format(DATE_FORMAT).to_string(),
                    row.customer_id,
                    row.customer_name,
                    row.customer_email,
                    row.ip_address,
                    row.device,
                    row.location
                ])?;

                if changed == 0 {
                    warn!("Uniqueness backstop rejected transaction [{}]; dedup should have excluded it", row.transaction_id);
                    report.rejected.push(row.transaction_id.clone());
                } else {
                    report.inserted += 1;
                }
            }
        }

        transaction.commit()?;
        Ok(report)
    }

    fn get(&self, transaction_id: &str) -> Result<Option<CanonicalTransaction>, StorageError> {
        let connection = self.lock()?;
        let stored = connection
            .query_row(
                &format!("SELECT {COLUMNS} FROM transactions WHERE transaction_id = ?1"),
                params![transaction_id],
                StoredRow::from_row
            )
            .optional()?;

        stored.map(StoredRow::into_transaction).transpose()
    }

    fn query(&self, range: &DateRange, bound: Option<&KeyBound>, limit: usize) -> Result<QueryPage, StorageError> {
        let (mut clauses, mut values) = range_filter(range);

        let descending = match bound {
            Some(KeyBound::After(key)) => {
                clauses.push("(date, transaction_id) > (?, ?)".to_string());
                values.push(Value::Text(key.date.format(DATE_FORMAT).to_string()));
                values.push(Value::Text(key.transaction_id.clone()));
                false
            }
            Some(KeyBound::Before(key)) => {
                clauses.push("(date, transaction_id) < (?, ?)".to_string());
                values.push(Value::Text(key.date.format(DATE_FORMAT).to_string()));
                values.push(Value::Text(key.transaction_id.clone()));
                true
            }
            None => false
        };

        let order = if descending { "DESC" } else { "ASC" };
        let sql = format!(
            "SELECT {COLUMNS} FROM transactions {} ORDER BY date {order}, transaction_id {order} LIMIT {}",
            where_clause(&clauses),
            limit + 1
        );

        let connection = self.lock()?;
        let mut statement = connection.prepare(&sql)?;
        let stored: Vec<StoredRow> = statement
            .query_map(params_from_iter(values.iter()), StoredRow::from_row)?
            .collect::<Result<_, _>>()?;
        drop(statement);
        drop(connection);

        let has_more = stored.len() > limit;
        let mut rows = stored.into_iter()
            .take(limit)
            .map(StoredRow::into_transaction)
            .collect::<Result<Vec<_>, _>>()?;

        if descending {
            rows.reverse();
        }

        Ok(QueryPage { rows, has_more })
    }

    fn count(&self, range: &DateRange) -> Result<u64, StorageError> {
        let (clauses, values) = range_filter(range);
        let sql = format!("SELECT COUNT(*) FROM transactions {}", where_clause(&clauses));

        let connection = self.lock()?;
        let count: i64 = connection.query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))?;

        Ok(count as u64)
    }

    fn watermark(&self) -> Result<u64, StorageError> {
        let connection = self.lock()?;
        let watermark: i64 = connection.query_row("SELECT COALESCE(MAX(rowid), 0) FROM transactions", [], |row| row.get(0))?;

        Ok(watermark as u64)
    }
}

fn range_filter(range: &DateRange) -> (Vec<String>, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    if let Some(start) = range.start {
        clauses.push("date >= ?".to_string());
        values.push(Value::Text(start.format(DATE_FORMAT).to_string()));
    }

    if let Some(end) = range.end {
        clauses.push("date <= ?".to_string());
        values.push(Value::Text(end.format(DATE_FORMAT).to_string()));
    }

    (clauses, values)
}

fn where_clause(clauses: &[String]) -> String {
    if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    }
}

/// Column values exactly as stored, converted after the statement finishes.
struct StoredRow {
    transaction_id: String,
    amount: String,
    currency: String,
    transaction_type: String,
    status: String,
    date: String,
    customer_id: String,
    customer_name: String,
    customer_email: String,
    ip_address: String,
    device: String,
    location: String
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            transaction_id: row.get(0)?,
            amount: row.get(1)?,
            currency: row.get(2)?,
            transaction_type: row.get(3)?,
            status: row.get(4)?,
            date: row.get(5)?,
            customer_id: row.get(6)?,
            customer_name: row.get(7)?,
            customer_email: row.get(8)?,
            ip_address: row.get(9)?,
            device: row.get(10)?,
            location: row.get(11)?
        })
    }

    fn into_transaction(self) -> Result<CanonicalTransaction, StorageError> {
        let id = self.transaction_id.as_str();

        let amount = Decimal::from_str(&self.amount).map_err(|error| StorageError::corrupt(id, error))?;
        let transaction_type = TransactionType::from_str(&self.transaction_type).map_err(|error| StorageError::corrupt(id, error))?;
        let status = TransactionStatus::from_str(&self.status).map_err(|error| StorageError::corrupt(id, error))?;
        let date = NaiveDate::parse_from_str(&self.date, DATE_FORMAT).map_err(|error| StorageError::corrupt(id, error))?;

        Ok(CanonicalTransaction {
            transaction_id: self.transaction_id,
            amount,
            currency: self.currency,
            transaction_type,
            status,
            date,
            customer_id: self.customer_id,
            customer_name: self.customer_name,
            customer_email: self.customer_email,
            ip_address: self.ip_address,
            device: self.device,
            location: self.location
        })
    }
}
