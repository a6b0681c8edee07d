use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use anyhow::{anyhow, Result};
use serde_json::Value;
use tempfile::TempDir;

const CSV_HEADER: &str = "transaction_id,amount,currency,transaction_type,status,date,customer_id,customer_name,customer_email,ip_address,device,location";

fn run_cli(data_dir: &Path, args: &[&str]) -> Result<Output> {
    let binary_path = env!("CARGO_BIN_EXE_transaction-ingest");

    Ok(Command::new(binary_path)
        .arg("--data-dir")
        .arg(data_dir)
        .args(["--log-level", "error"])
        .args(args)
        .env_remove("INGEST_DB_PATH")
        .env_remove("INGEST_INTAKE_DIR")
        .env_remove("INGEST_ARCHIVE_DIR")
        .output()?)
}

fn stdout_json(output: &Output) -> Result<Value> {
    if !output.status.success() {
        return Err(anyhow!("command failed: {}", String::from_utf8_lossy(&output.stderr)));
    }

    Ok(serde_json::from_slice(&output.stdout)?)
}

fn seed_intake(data_dir: &Path, days: u32) -> Result<()> {
    let intake = data_dir.join("incoming");
    fs::create_dir_all(&intake)?;

    let mut content = format!("{CSV_HEADER}\n");
    for day in 1..=days {
        content.push_str(&format!("tx-{day:02},{day}.00,USD,REFUND,COMPLETED,2025-03-{day:02},CUST-{day},Name {day},c{day}@example.com,,,\n"));
    }
    fs::write(intake.join("march.csv"), content)?;

    Ok(())
}

fn page_ids(page: &Value) -> Vec<String> {
    page["data"].as_array()
        .map(|rows| rows.iter().filter_map(|row| row["transaction_id"].as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

#[test]
fn test_cli_ingest_reports_counts_and_archives() -> Result<()> {
    let data_dir = TempDir::new()?;
    seed_intake(data_dir.path(), 25)?;

    let report = stdout_json(&run_cli(data_dir.path(), &["ingest"])?)?;

    assert_eq!(report["files_processed"], 1);
    assert_eq!(report["inserted"], 25);
    assert_eq!(report["archived"], 1);
    assert!(data_dir.path().join("transactions.db").exists());
    assert!(data_dir.path().join("ingested_files.json").exists());

    let rerun = stdout_json(&run_cli(data_dir.path(), &["ingest"])?)?;
    assert_eq!(rerun["files_seen"], 0);
    assert_eq!(rerun["inserted"], 0);

    Ok(())
}

#[test]
fn test_cli_query_pages_forward_and_back() -> Result<()> {
    let data_dir = TempDir::new()?;
    seed_intake(data_dir.path(), 25)?;
    stdout_json(&run_cli(data_dir.path(), &["ingest"])?)?;

    let first = stdout_json(&run_cli(data_dir.path(), &["query", "--limit", "10"])?)?;
    assert_eq!(first["total"], 25);
    assert_eq!(page_ids(&first).first().map(String::as_str), Some("tx-01"));
    assert_eq!(page_ids(&first).len(), 10);
    assert!(first["prev_cursor"].is_null());

    let next = first["next_cursor"].as_str().ok_or_else(|| anyhow!("first page has no next cursor"))?;
    let second = stdout_json(&run_cli(data_dir.path(), &["query", "--limit", "10", "--cursor", next])?)?;
    assert_eq!(page_ids(&second).first().map(String::as_str), Some("tx-11"));

    let prev = second["prev_cursor"].as_str().ok_or_else(|| anyhow!("second page has no prev cursor"))?;
    let back = stdout_json(&run_cli(data_dir.path(), &["query", "--limit", "10", "--cursor", prev])?)?;
    assert_eq!(page_ids(&back), page_ids(&first));

    Ok(())
}

#[test]
fn test_cli_query_filters_by_date() -> Result<()> {
    let data_dir = TempDir::new()?;
    seed_intake(data_dir.path(), 25)?;
    stdout_json(&run_cli(data_dir.path(), &["ingest"])?)?;

    let page = stdout_json(&run_cli(data_dir.path(), &["query", "--start-date", "2025-03-20", "--end-date", "2025-03-22"])?)?;

    assert_eq!(page["total"], 3);
    assert_eq!(page_ids(&page), vec!["tx-20", "tx-21", "tx-22"]);
    assert!(page["next_cursor"].is_null());

    Ok(())
}

#[test]
fn test_cli_reset_tracker_clears_state() -> Result<()> {
    let data_dir = TempDir::new()?;
    seed_intake(data_dir.path(), 3)?;
    stdout_json(&run_cli(data_dir.path(), &["ingest"])?)?;

    stdout_json(&run_cli(data_dir.path(), &["reset-tracker"])?)?;

    assert!(!data_dir.path().join("ingested_files.json").exists());

    Ok(())
}

#[test]
fn test_cli_rejects_unknown_subcommand() -> Result<()> {
    let data_dir = TempDir::new()?;
    let output = run_cli(data_dir.path(), &["explode"])?;

    assert!(!output.status.success());

    Ok(())
}
