use std::io::{stderr, stdout, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

use transaction_ingest::engine::{IngestionEngine, PipelineConfig, DEFAULT_MAX_FILES};
use transaction_ingest::pagination::{PageRequest, Paginator, PaginatorConfig};
use transaction_ingest::storage::SqliteStorage;
use transaction_ingest::types::DateRange;

#[derive(Parser)]
#[command(name = "transaction-ingest", version, about = "Ingests transaction files into a deduplicated store and pages through it")]
struct Cli {
    /// Root directory holding `incoming/`, `archive/` and the tracker state.
    #[arg(long, global = true, env = "INGEST_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// SQLite database file. Defaults to `<data-dir>/transactions.db`.
    #[arg(long, global = true, env = "INGEST_DB_PATH")]
    db_path: Option<PathBuf>,

    /// One of error, warn, info, debug, trace.
    #[arg(long, global = true, env = "INGEST_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command
}

#[derive(Subcommand)]
enum Command {
    /// Run one ingestion pipeline over the intake directory.
    Ingest(IngestArgs),
    /// Serve one page of stored transactions.
    Query(QueryArgs),
    /// Forget every ingested file so the next run reads them again.
    ResetTracker
}

#[derive(Args)]
struct IngestArgs {
    /// Intake directory. Defaults to `<data-dir>/incoming`.
    #[arg(long, env = "INGEST_INTAKE_DIR")]
    intake_dir: Option<PathBuf>,

    /// Archive directory. Defaults to `<data-dir>/archive`.
    #[arg(long, env = "INGEST_ARCHIVE_DIR")]
    archive_dir: Option<PathBuf>,

    /// Files kept per extension in the intake directory.
    #[arg(long, env = "INGEST_MAX_FILES", default_value_t = DEFAULT_MAX_FILES)]
    max_files: usize,

    /// Re-read every file, ignoring tracker state.
    #[arg(long)]
    full: bool,

    #[arg(long, value_delimiter = ',', default_value = "csv,json")]
    extensions: Vec<String>
}

#[derive(Args)]
struct QueryArgs {
    /// Inclusive lower bound, YYYY-MM-DD.
    #[arg(long)]
    start_date: Option<NaiveDate>,

    /// Inclusive upper bound, YYYY-MM-DD.
    #[arg(long)]
    end_date: Option<NaiveDate>,

    /// Opaque cursor taken from a previous page.
    #[arg(long)]
    cursor: Option<String>,

    #[arg(long, default_value_t = 100)]
    limit: usize,

    #[arg(long, default_value_t = 60)]
    count_cache_ttl_secs: u64
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(parse_log_level(&cli.log_level));

    let db_path = cli.db_path.clone().unwrap_or_else(|| cli.data_dir.join("transactions.db"));
    let storage = Arc::new(SqliteStorage::open(&db_path)?);
    let config = PipelineConfig::new(&cli.data_dir);

    match cli.command {
        Command::Ingest(args) => {
            let mut config = config
                .with_max_files(args.max_files)
                .with_incremental(!args.full)
                .with_extensions(args.extensions);

            if let Some(intake_dir) = args.intake_dir {
                config = config.with_intake_dir(intake_dir);
            }
            if let Some(archive_dir) = args.archive_dir {
                config = config.with_archive_dir(archive_dir);
            }

            let report = IngestionEngine::new(storage).with_config(config).run().await?;
            write_json_to_stdout(&report)?;
        }
        Command::Query(args) => {
            let paginator_config = PaginatorConfig::default()
                .with_count_cache_ttl(Duration::from_secs(args.count_cache_ttl_secs));
            let paginator = Paginator::with_config(storage, paginator_config);
            let request = PageRequest {
                range: DateRange::new(args.start_date, args.end_date),
                cursor: args.cursor,
                limit: args.limit
            };

            let page = paginator.page(&request).await?;
            write_json_to_stdout(&page)?;
        }
        Command::ResetTracker => {
            IngestionEngine::new(storage).with_config(config.clone()).reset_tracker()?;
            write_json_to_stdout(&serde_json::json!({ "reset": config.tracker_path }))?;
        }
    }

    Ok(())
}

fn parse_log_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => {
            eprintln!("Invalid log level '{}', defaulting to 'info'", level);
            LevelFilter::INFO
        }
    }
}

fn setup_logging(level: LevelFilter) {
    //NOTE: stdout carries the JSON result, so logging goes to stderr
    let terminal_log = fmt::layer()
        .with_target(false)
        .with_writer(stderr)
        .with_filter(level);

    tracing_subscriber::registry()
        .with(terminal_log)
        .init();
}

fn write_json_to_stdout<T: Serialize>(value: &T) -> Result<()> {
    let mut output = BufWriter::new(stdout().lock());

    serde_json::to_writer_pretty(&mut output, value)?;
    writeln!(output)?;
    output.flush()?;

    Ok(())
}
