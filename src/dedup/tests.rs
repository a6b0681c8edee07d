use super::{deduplicate, exclude_existing, remove_intra_batch_duplicates};
use crate::models::{CanonicalTransaction, TransactionStatus, TransactionType};
use crate::storage::{MemoryStorage, Storage};

use std::str::FromStr;

use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;

fn create_transaction(transaction_id: &str, customer_id: &str) -> Result<CanonicalTransaction> {
    Ok(CanonicalTransaction {
        transaction_id: transaction_id.to_string(),
        amount: Decimal::from_str("5.00")?,
        currency: "KES".to_string(),
        transaction_type: TransactionType::Payment,
        status: TransactionStatus::Pending,
        date: NaiveDate::from_str("2025-03-01")?,
        customer_id: customer_id.to_string(),
        customer_name: "Customer".to_string(),
        customer_email: "customer@example.com".to_string(),
        ip_address: "unknown".to_string(),
        device: "unknown".to_string(),
        location: "unknown".to_string()
    })
}

#[test]
fn test_intra_batch_keeps_first_occurrence_in_encounter_order() -> Result<()> {
    let candidates = vec![
        create_transaction("tx-1", "first")?,
        create_transaction("tx-2", "first")?,
        create_transaction("tx-1", "second")?,
        create_transaction("tx-3", "first")?,
        create_transaction("tx-2", "second")?
    ];

    let (survivors, dropped) = remove_intra_batch_duplicates(candidates);
    let kept: Vec<_> = survivors.iter().map(|row| (row.transaction_id.as_str(), row.customer_id.as_str())).collect();

    assert_eq!(kept, vec![("tx-1", "first"), ("tx-2", "first"), ("tx-3", "first")]);
    assert_eq!(dropped, 2);

    Ok(())
}

#[test]
fn test_cross_load_excludes_identifiers_already_stored() -> Result<()> {
    let storage = MemoryStorage::new();
    storage.insert_batch(vec![create_transaction("tx-2", "stored")?])?;

    let (fresh, excluded) = exclude_existing(&storage, vec![
        create_transaction("tx-1", "new")?,
        create_transaction("tx-2", "new")?,
        create_transaction("tx-3", "new")?
    ])?;

    let ids: Vec<_> = fresh.iter().map(|row| row.transaction_id.as_str()).collect();

    assert_eq!(ids, vec!["tx-1", "tx-3"]);
    assert_eq!(excluded, 1);

    Ok(())
}

#[test]
fn test_deduplicate_reports_each_category_separately() -> Result<()> {
    let storage = MemoryStorage::new();
    storage.insert_batch(vec![create_transaction("tx-9", "stored")?])?;

    let outcome = deduplicate(&storage, vec![
        create_transaction("tx-1", "a")?,
        create_transaction("tx-9", "a")?,
        create_transaction("tx-1", "b")?,
        create_transaction("tx-9", "b")?,
        create_transaction("tx-2", "a")?
    ])?;

    assert_eq!(outcome.rows.len(), 2);
    assert_eq!(outcome.intra_batch_duplicates, 2);
    assert_eq!(outcome.existing_duplicates, 1);
    assert_eq!(outcome.total_duplicates(), 3);

    Ok(())
}

#[test]
fn test_empty_batch_passes_through() -> Result<()> {
    let storage = MemoryStorage::new();
    let outcome = deduplicate(&storage, Vec::new())?;

    assert!(outcome.rows.is_empty());
    assert_eq!(outcome.total_duplicates(), 0);

    Ok(())
}
