use super::{KeyBound, MemoryStorage, SqliteStorage, Storage};
use crate::models::{CanonicalTransaction, SortKey, TransactionStatus, TransactionType};
use crate::types::DateRange;

use std::str::FromStr;

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tempfile::TempDir;

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
}

fn create_transaction(transaction_id: &str, day: u32) -> CanonicalTransaction {
    CanonicalTransaction {
        transaction_id: transaction_id.to_string(),
        amount: Decimal::from_str("42.10").unwrap(),
        currency: "KES".to_string(),
        transaction_type: TransactionType::Transfer,
        status: TransactionStatus::Completed,
        date: date(day),
        customer_id: "CUST-1".to_string(),
        customer_name: "Customer 1".to_string(),
        customer_email: "c1@example.com".to_string(),
        ip_address: "10.0.0.1".to_string(),
        device: "mobile".to_string(),
        location: "Mombasa".to_string()
    }
}

fn ids(rows: &[CanonicalTransaction]) -> Vec<&str> {
    rows.iter().map(|row| row.transaction_id.as_str()).collect()
}

fn backends() -> Result<Vec<Box<dyn Storage>>> {
    Ok(vec![Box::new(MemoryStorage::new()), Box::new(SqliteStorage::open_in_memory()?)])
}

#[test]
fn test_insert_batch_round_trips_rows_exactly() -> Result<()> {
    for storage in backends()? {
        let original = create_transaction("tx-1", 1);
        let report = storage.insert_batch(vec![original.clone()])?;
        let loaded = storage.get("tx-1")?.ok_or_else(|| anyhow!("tx-1 missing from storage"))?;

        assert_eq!(report.inserted, 1);
        assert_eq!(loaded, original);
        assert!(storage.get("tx-unknown")?.is_none());
    }

    Ok(())
}

#[test]
fn test_uniqueness_backstop_rejects_only_offending_rows() -> Result<()> {
    for storage in backends()? {
        storage.insert_batch(vec![create_transaction("tx-1", 1)])?;

        let report = storage.insert_batch(vec![
            create_transaction("tx-1", 9),
            create_transaction("tx-2", 2),
            create_transaction("tx-2", 3),
            create_transaction("tx-3", 3)
        ])?;

        assert_eq!(report.inserted, 2);
        assert_eq!(report.rejected, vec!["tx-1".to_string(), "tx-2".to_string()]);
        assert_eq!(storage.count(&DateRange::unbounded())?, 3);

        let first = storage.get("tx-1")?.ok_or_else(|| anyhow!("tx-1 missing from storage"))?;
        assert_eq!(first.date, date(1));
    }

    Ok(())
}

#[test]
fn test_existing_ids_returns_only_stored_identifiers() -> Result<()> {
    for storage in backends()? {
        storage.insert_batch(vec![create_transaction("tx-1", 1), create_transaction("tx-2", 2)])?;

        let probe = vec!["tx-2".to_string(), "tx-3".to_string(), "tx-1".to_string()];
        let existing = storage.existing_ids(&probe)?;

        assert_eq!(existing.len(), 2);
        assert!(existing.contains("tx-1") && existing.contains("tx-2"));
        assert!(storage.existing_ids(&[])?.is_empty());
    }

    Ok(())
}

#[test]
fn test_existing_ids_handles_batches_larger_than_one_statement() -> Result<()> {
    let storage = SqliteStorage::open_in_memory()?;
    let rows: Vec<_> = (0..1200).map(|index| create_transaction(&format!("tx-{index:05}"), 1 + index % 28)).collect();
    storage.insert_batch(rows)?;

    let probe: Vec<_> = (600..1800).map(|index| format!("tx-{index:05}")).collect();

    assert_eq!(storage.existing_ids(&probe)?.len(), 600);

    Ok(())
}

#[test]
fn test_query_orders_by_date_then_identifier_and_honours_bounds() -> Result<()> {
    for storage in backends()? {
        storage.insert_batch(vec![
            create_transaction("b", 2),
            create_transaction("a", 2),
            create_transaction("z", 1),
            create_transaction("c", 3),
            create_transaction("d", 4)
        ])?;

        let all = storage.query(&DateRange::unbounded(), None, 10)?;
        assert_eq!(ids(&all.rows), vec!["z", "a", "b", "c", "d"]);
        assert!(!all.has_more);

        let first_two = storage.query(&DateRange::unbounded(), None, 2)?;
        assert_eq!(ids(&first_two.rows), vec!["z", "a"]);
        assert!(first_two.has_more);

        let after = storage.query(&DateRange::unbounded(), Some(&KeyBound::After(SortKey::new(date(2), "a"))), 2)?;
        assert_eq!(ids(&after.rows), vec!["b", "c"]);
        assert!(after.has_more);

        let before = storage.query(&DateRange::unbounded(), Some(&KeyBound::Before(SortKey::new(date(3), "c"))), 2)?;
        assert_eq!(ids(&before.rows), vec!["a", "b"]);
        assert!(before.has_more);

        let before_start = storage.query(&DateRange::unbounded(), Some(&KeyBound::Before(SortKey::new(date(2), "a"))), 5)?;
        assert_eq!(ids(&before_start.rows), vec!["z"]);
        assert!(!before_start.has_more);
    }

    Ok(())
}

#[test]
fn test_query_and_count_respect_inclusive_date_range() -> Result<()> {
    for storage in backends()? {
        let rows: Vec<_> = (1..=10).map(|day| create_transaction(&format!("tx-{day:02}"), day)).collect();
        storage.insert_batch(rows)?;

        let range = DateRange::new(Some(date(3)), Some(date(6)));
        let page = storage.query(&range, None, 100)?;

        assert_eq!(ids(&page.rows), vec!["tx-03", "tx-04", "tx-05", "tx-06"]);
        assert_eq!(storage.count(&range)?, 4);

        let backward = storage.query(&range, Some(&KeyBound::Before(SortKey::new(date(9), "tx-09"))), 2)?;
        assert_eq!(ids(&backward.rows), vec!["tx-05", "tx-06"]);
        assert!(backward.has_more);

        let empty = DateRange::new(Some(date(20)), None);
        assert!(storage.query(&empty, None, 10)?.rows.is_empty());
        assert_eq!(storage.count(&empty)?, 0);
    }

    Ok(())
}

#[test]
fn test_watermark_moves_only_when_rows_are_committed() -> Result<()> {
    for storage in backends()? {
        let initial = storage.watermark()?;
        storage.insert_batch(vec![create_transaction("tx-1", 1)])?;
        let after_insert = storage.watermark()?;
        storage.insert_batch(vec![create_transaction("tx-1", 1)])?;

        assert!(after_insert > initial);
        assert_eq!(storage.watermark()?, after_insert);
    }

    Ok(())
}

#[test]
fn test_sqlite_storage_persists_across_reopen() -> Result<()> {
    let directory = TempDir::new()?;
    let path = directory.path().join("db").join("transactions.sqlite");

    {
        let storage = SqliteStorage::open(&path)?;
        storage.insert_batch(vec![create_transaction("tx-1", 1), create_transaction("tx-2", 2)])?;
    }

    let reopened = SqliteStorage::open(&path)?;

    assert_eq!(reopened.count(&DateRange::unbounded())?, 2);
    assert!(reopened.get("tx-2")?.is_some());

    Ok(())
}
