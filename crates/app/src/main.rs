use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ledgerdrop_core::TransactionSink;
use ledgerdrop_import::{
    format_total, read_batch, summarize, BatchSummary, IngestPipeline, PipelineReport,
};
use ledgerdrop_storage::{create_db, CsvSink, SqliteStore};
use ledgerdrop_watch::{FolderWatcher, NotifyEventSource, Router};
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

mod config;

use config::{AppPaths, Settings, SinkKind};

#[derive(Parser)]
#[command(
    name = "ledgerdrop",
    version,
    about = "Watch a folder for bank-statement CSVs, clean them and store the rows"
)]
struct Cli {
    /// Settings file (defaults to ledgerdrop.toml in the platform config dir)
    #[arg(short, long, global = true, env = "LEDGERDROP_CONFIG")]
    config: Option<PathBuf>,

    /// Folder to watch for new statements
    #[arg(long, global = true, env = "FINANCE_WATCH_FOLDER")]
    watch_dir: Option<PathBuf>,

    /// Where cleaned rows go
    #[arg(long, global = true, value_enum)]
    sink: Option<SinkKind>,

    /// SQLite database file
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the intake folder until Ctrl-C (default)
    Watch,
    /// Clean a single file without watching or moving it
    Process {
        file: PathBuf,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
        /// Skip writing to the sink
        #[arg(long)]
        dry_run: bool,
    },
    /// Show how many rows are stored, plus the most recent ones
    Count {
        #[arg(short, long, default_value = "10")]
        limit: i64,
    },
    /// Show resolved settings and paths
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let paths = AppPaths::new()?;
    let config_file = cli.config.clone().unwrap_or_else(|| paths.config_file());
    let mut settings = Settings::load(&config_file)?;
    if let Some(dir) = cli.watch_dir {
        settings.watch_dir = dir;
    }
    if let Some(sink) = cli.sink {
        settings.sink = sink;
    }
    if let Some(db) = cli.database {
        settings.database = Some(db);
    }

    match cli.command.unwrap_or(Commands::Watch) {
        Commands::Watch => run_watch(&settings, &paths).await,
        Commands::Process {
            file,
            json,
            dry_run,
        } => run_process(&settings, &paths, &file, json, dry_run).await,
        Commands::Count { limit } => run_count(&settings, &paths, limit).await,
        Commands::Config => {
            print_config(&settings, &paths, &config_file);
            Ok(())
        }
    }
}

async fn open_store(settings: &Settings, paths: &AppPaths) -> Result<SqliteStore> {
    let db_path = settings.database(paths);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let pool = create_db(&db_path)
        .await
        .with_context(|| format!("failed to open database {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), "database ready");
    Ok(SqliteStore::new(pool))
}

async fn run_watch(settings: &Settings, paths: &AppPaths) -> Result<()> {
    let pipeline = settings.pipeline()?;
    match settings.sink {
        SinkKind::Sqlite => watch_with(settings, pipeline, open_store(settings, paths).await?).await,
        SinkKind::Csv => watch_with(settings, pipeline, CsvSink::new(&settings.output_dir)).await,
    }
}

async fn watch_with<S: TransactionSink>(
    settings: &Settings,
    pipeline: IngestPipeline,
    sink: S,
) -> Result<()> {
    let processed = settings.processed_dir();
    let failed = settings.failed_dir();
    for dir in [&settings.watch_dir, &processed, &failed] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let source = NotifyEventSource::watch(&settings.watch_dir)
        .with_context(|| format!("failed to watch {}", settings.watch_dir.display()))?;

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("stop requested, finishing current file");
            let _ = stop_tx.send(true);
        }
    });

    tracing::info!(
        watch = %settings.watch_dir.display(),
        processed = %processed.display(),
        failed = %failed.display(),
        rules = pipeline.rules().len(),
        "watching for new files"
    );

    let mut watcher = FolderWatcher::new(pipeline, sink, Router::new(processed, failed))
        .with_settle(settings.settle)
        .with_extension(&settings.extension);
    watcher.run(source, stop_rx).await;
    Ok(())
}

async fn run_process(
    settings: &Settings,
    paths: &AppPaths,
    file: &Path,
    json: bool,
    dry_run: bool,
) -> Result<()> {
    let pipeline = settings.pipeline()?;
    let bytes = std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let batch = read_batch(bytes.as_slice())?;
    let report = pipeline.run(batch)?;
    let summary = summarize(&report.records);

    let source_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stored = if dry_run {
        None
    } else {
        Some(match settings.sink {
            SinkKind::Sqlite => {
                open_store(settings, paths)
                    .await?
                    .insert_batch(&source_name, &report.records)
                    .await?
            }
            SinkKind::Csv => {
                CsvSink::new(&settings.output_dir)
                    .insert_batch(&source_name, &report.records)
                    .await?
            }
        })
    };

    if json {
        let out = serde_json::json!({
            "file": source_name,
            "input_rows": report.input_rows,
            "duplicates_removed": report.duplicates_removed,
            "invalid_dates_dropped": report.invalid_dates_dropped,
            "rows_stored": stored,
            "summary": summary,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_report(&source_name, &report, &summary, stored);
    }
    Ok(())
}

fn print_report(name: &str, report: &PipelineReport, summary: &BatchSummary, stored: Option<u64>) {
    println!("{name}");
    println!("  Input rows:          {}", report.input_rows);
    println!("  Duplicates removed:  {}", report.duplicates_removed);
    println!("  Invalid dates:       {}", report.invalid_dates_dropped);
    println!("  Clean rows:          {}", summary.rows);
    if let Some(range) = summary.date_range {
        println!("  Date range:          {range}");
    }
    println!("  Net amount:          {}", format_total(summary.net_total));
    match stored {
        Some(n) => println!("  Rows stored:         {n}"),
        None => println!("  Rows stored:         (dry run)"),
    }

    println!();
    println!("Categories:");
    for c in &summary.categories {
        println!("  {:<20} {:>5}  {:>12}", c.category, c.count, format_total(c.total));
    }
    println!();
    println!("Transaction types:");
    for (kind, count) in &summary.transaction_types {
        println!("  {:<20} {:>5}", kind.as_str(), count);
    }
}

async fn run_count(settings: &Settings, paths: &AppPaths, limit: i64) -> Result<()> {
    let store = open_store(settings, paths).await?;
    let total = ledgerdrop_storage::count_transactions(store.pool()).await?;
    println!("{total} transactions stored");

    let latest = ledgerdrop_storage::latest_transactions(store.pool(), limit).await?;
    if !latest.is_empty() {
        println!();
        for r in latest {
            println!(
                "  {}  {:<32}  {:<16}  {:<7}  {:>10}",
                r.transaction_date,
                r.description_or_empty(),
                r.category,
                r.transaction_type.as_str(),
                r.amount.to_string()
            );
        }
    }
    Ok(())
}

fn print_config(settings: &Settings, paths: &AppPaths, config_file: &Path) {
    println!("Config file:   {}", config_file.display());
    println!("Data dir:      {}", paths.data_dir().display());
    println!("Watch dir:     {}", settings.watch_dir.display());
    println!("Processed dir: {}", settings.processed_dir().display());
    println!("Failed dir:    {}", settings.failed_dir().display());
    match settings.sink {
        SinkKind::Sqlite => println!("Sink:          sqlite ({})", settings.database(paths).display()),
        SinkKind::Csv => println!("Sink:          csv ({})", settings.output_dir.display()),
    }
    println!("Date format:   {}", settings.date_format);
    println!("Settle:        {:?}", settings.settle);
    let rules = settings
        .rules
        .as_ref()
        .map_or_else(|| "built-in".to_string(), |r| format!("{} configured", r.len()));
    println!("Rules:         {rules}");
}
