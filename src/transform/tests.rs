use super::{parse_bytes, parse_file, FileShape, TransformError};

use std::fs;
use std::path::Path;

use anyhow::Result;
use tempfile::TempDir;

const CSV_HEADER: &str = "transaction_id,amount,currency,transaction_type,status,date,customer_id,customer_name,customer_email,ip_address,device,location";

fn csv_row(transaction_id: &str, amount: &str, date: &str) -> String {
    format!("{transaction_id},{amount},KES,PAYMENT,COMPLETED,{date},CUST-1,Customer 1,c1@example.com,10.0.0.1,mobile,Nairobi")
}

fn json_record(transaction_id: &str, amount: &str, date: &str) -> String {
    format!(
        r#"{{"transaction_id":"{transaction_id}","amount":{amount},"currency":"KES","transaction_type":"DEPOSIT","status":"PENDING","date":"{date}","customer":{{"customer_id":"CUST-2","name":"Customer 2","email":"c2@example.com"}},"metadata":{{"ip_address":"10.0.0.2","device":"tablet","location":"Nakuru"}}}}"#
    )
}

#[test]
fn test_shape_is_chosen_from_extension() {
    assert_eq!(FileShape::from_path(Path::new("batch.json")), Some(FileShape::Nested));
    assert_eq!(FileShape::from_path(Path::new("batch.CSV")), Some(FileShape::Flat));
    assert_eq!(FileShape::from_path(Path::new("batch.txt")), None);
    assert_eq!(FileShape::from_path(Path::new("batch")), None);
}

#[test]
fn test_flat_file_keeps_valid_rows_and_counts_invalid_ones() -> Result<()> {
    let content = [
        CSV_HEADER.to_string(),
        csv_row("tx-1", "10.00", "2025-03-01"),
        csv_row("tx-2", "-3.00", "2025-03-01"),
        csv_row("tx-3", "12.00", "not-a-date"),
        csv_row("tx-4", "15.50", "2025-03-02")
    ].join("\n");

    let parsed = parse_bytes(content.as_bytes(), FileShape::Flat)?;
    let ids: Vec<_> = parsed.records.iter().map(|record| record.transaction_id.as_str()).collect();

    assert_eq!(ids, vec!["tx-1", "tx-4"]);
    assert_eq!(parsed.raw_count, 4);
    assert_eq!(parsed.invalid_count, 2);

    Ok(())
}

#[test]
fn test_nested_file_keeps_valid_records_and_counts_undecodable_elements() -> Result<()> {
    let content = format!(
        "[{}, 42, {}, {}]",
        json_record("tx-1", "10.5", "2025-03-01"),
        json_record("tx-2", "0", "2025-03-01"),
        json_record("tx-3", "99.99", "2025-03-03")
    );

    let parsed = parse_bytes(content.as_bytes(), FileShape::Nested)?;
    let ids: Vec<_> = parsed.records.iter().map(|record| record.transaction_id.as_str()).collect();

    assert_eq!(ids, vec!["tx-1", "tx-3"]);
    assert_eq!(parsed.raw_count, 4);
    assert_eq!(parsed.invalid_count, 2);

    Ok(())
}

#[test]
fn test_unusable_structure_fails_the_whole_file() {
    let not_an_array = parse_bytes(br#"{"transaction_id": "tx-1"}"#, FileShape::Nested);
    let truncated = parse_bytes(b"[{\"transaction_id\": ", FileShape::Nested);
    let wrong_header = parse_bytes(b"id,amount\n1,2\n", FileShape::Flat);

    assert!(matches!(not_an_array, Err(TransformError::Json(_))));
    assert!(matches!(truncated, Err(TransformError::Json(_))));
    assert!(matches!(wrong_header, Err(TransformError::MissingColumn("transaction_id"))));
}

#[test]
fn test_blank_file_parses_to_nothing() -> Result<()> {
    let parsed = parse_bytes(b"  \n", FileShape::Nested)?;

    assert!(parsed.is_empty());
    assert!(parsed.records.is_empty());

    Ok(())
}

#[test]
fn test_parsing_is_deterministic() -> Result<()> {
    let content = [
        CSV_HEADER.to_string(),
        csv_row("tx-9", "1.00", "2025-03-09"),
        csv_row("tx-1", "2.00", "2025-03-01"),
        csv_row("tx-5", "3.00", "2025-03-05")
    ].join("\n");

    let first = parse_bytes(content.as_bytes(), FileShape::Flat)?;
    let second = parse_bytes(content.as_bytes(), FileShape::Flat)?;

    assert_eq!(first.records, second.records);

    Ok(())
}

#[test]
fn test_parse_file_reads_from_disk_and_reports_unreadable_paths() -> Result<()> {
    let directory = TempDir::new()?;
    let csv_path = directory.path().join("batch.csv");
    fs::write(&csv_path, [CSV_HEADER.to_string(), csv_row("tx-1", "10", "2025-03-01")].join("\n"))?;

    let parsed = parse_file(&csv_path)?;

    assert_eq!(parsed.records.len(), 1);
    assert!(matches!(parse_file(&directory.path().join("missing.csv")), Err(TransformError::Unreadable { .. })));
    assert!(matches!(parse_file(&directory.path().join("notes.txt")), Err(TransformError::UnsupportedShape(_))));

    Ok(())
}
