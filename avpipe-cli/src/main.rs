//! avpipe CLI: load, inspect, export and remove stored market data.
//!
//! Commands:
//! - `run` fetches the configured tickers from Alpha Vantage into SQLite
//! - `status` reports stored tickers, row counts and recent runs
//! - `export` writes one ticker's prices and indicators as CSV
//! - `remove` deletes a ticker and everything stored for it

use anyhow::{Context, Result};
use avpipe_core::data::{AlphaVantageClient, OutputSize};
use avpipe_core::domain::normalize_symbol;
use avpipe_core::store::Store;
use avpipe_runner::{export_history_csv, Pipeline, Settings, StdoutProgress};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "avpipe",
    about = "Alpha Vantage daily prices and indicators into SQLite"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch tickers, store new prices and recompute indicators.
    Run {
        /// Symbols to load. Defaults to the configured ticker list.
        symbols: Vec<String>,

        /// Path to a TOML settings file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Database path or sqlite:// url. Overrides DATABASE_URL.
        #[arg(long)]
        db: Option<String>,

        /// compact (latest 100 bars) or full history.
        #[arg(long)]
        outputsize: Option<OutputSize>,
    },
    /// Show stored tickers and the most recent runs.
    Status {
        /// Database path or sqlite:// url. Overrides DATABASE_URL.
        #[arg(long)]
        db: Option<String>,

        /// Number of run log entries to show.
        #[arg(long, default_value_t = 10)]
        runs: usize,
    },
    /// Write a ticker's prices and indicators as CSV.
    Export {
        symbol: String,

        /// Database path or sqlite:// url. Overrides DATABASE_URL.
        #[arg(long)]
        db: Option<String>,

        /// Output file. Defaults to stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Delete a ticker with its company, price and indicator rows.
    Remove {
        symbol: String,

        /// Database path or sqlite:// url. Overrides DATABASE_URL.
        #[arg(long)]
        db: Option<String>,

        /// Actually delete (without this flag, only previews what would be removed).
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            symbols,
            config,
            db,
            outputsize,
        } => run_pipeline(symbols, config.as_deref(), db, outputsize),
        Commands::Status { db, runs } => run_status(db, runs),
        Commands::Export { symbol, db, out } => run_export(&symbol, db, out.as_deref()),
        Commands::Remove {
            symbol,
            db,
            confirm,
        } => run_remove(&symbol, db, confirm),
    }
}

fn run_pipeline(
    symbols: Vec<String>,
    config: Option<&Path>,
    db: Option<String>,
    outputsize: Option<OutputSize>,
) -> Result<()> {
    let mut settings = Settings::load(config)?;
    if let Some(db) = db {
        settings.database_url = db;
    }
    if let Some(size) = outputsize {
        settings.output_size = size;
    }
    if !symbols.is_empty() {
        settings.tickers = symbols;
    }
    settings.validate()?;

    let store = open_store(&settings.database_url)?;
    let client = AlphaVantageClient::connect(settings.api_key.clone(), settings.retry_policy())
        .context("failed to build HTTP client")?;

    info!(
        database = %settings.database_url,
        output_size = %settings.output_size,
        attempts = settings.retry_attempts,
        "loading {} tickers",
        settings.tickers.len()
    );

    let mut pipeline = Pipeline::new(store, client).with_output_size(settings.output_size);
    let mut progress = StdoutProgress::new();
    let summary = pipeline.run_with_progress(settings.tickers.as_slice(), &mut progress);

    if !summary.all_succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_status(db: Option<String>, runs: usize) -> Result<()> {
    let url = database_url(db)?;
    let store = open_store(&url)?;
    let stats = store.ticker_stats()?;

    if stats.is_empty() {
        println!("No tickers stored in {url}");
    } else {
        println!("Database: {url}");
        println!();
        println!(
            "{:<8} {:<32} {:>8} {:>11} {:<12} {:<12}",
            "Symbol", "Name", "Prices", "Indicators", "First", "Last"
        );
        println!("{}", "-".repeat(88));
        for s in &stats {
            println!(
                "{:<8} {:<32} {:>8} {:>11} {:<12} {:<12}",
                s.symbol,
                truncate(s.name.as_deref().unwrap_or("-"), 32),
                s.price_rows,
                s.indicator_rows,
                s.first_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
                s.last_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
            );
        }
    }

    let logs = store.run_logs(None, runs)?;
    if !logs.is_empty() {
        println!();
        println!("Recent runs:");
        println!("{:<26} {:<8} {:<8} {:>10}", "Time", "Symbol", "Status", "Seconds");
        println!("{}", "-".repeat(55));
        for log in &logs {
            println!(
                "{:<26} {:<8} {:<8} {:>10.4}",
                log.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                log.symbol,
                log.status.as_str(),
                log.request_time
            );
        }
    }
    Ok(())
}

fn run_export(symbol: &str, db: Option<String>, out: Option<&Path>) -> Result<()> {
    let store = open_store(&database_url(db)?)?;

    let rows = match out {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let rows = export_history_csv(&store, symbol, file)?;
            eprintln!("Wrote {rows} rows to {}", path.display());
            rows
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            let rows = export_history_csv(&store, symbol, &mut lock)?;
            lock.flush()?;
            rows
        }
    };
    info!(symbol, rows, "export complete");
    Ok(())
}

fn run_remove(symbol: &str, db: Option<String>, confirm: bool) -> Result<()> {
    let store = open_store(&database_url(db)?)?;
    let symbol = normalize_symbol(symbol);

    let Some(ticker) = store.ticker(&symbol)? else {
        println!("{symbol} is not stored");
        return Ok(());
    };
    let prices = store.prices(ticker.id)?.len();
    let indicators = store.indicators(ticker.id)?.len();

    if !confirm {
        println!(
            "Would remove {symbol}: {prices} price rows, {indicators} indicator rows, company info"
        );
        println!("Re-run with --confirm to delete.");
        return Ok(());
    }

    store.delete_ticker(&symbol)?;
    println!("Removed {symbol} ({prices} price rows, {indicators} indicator rows)");
    Ok(())
}

/// `--db` if given, else DATABASE_URL (.env included), else the default file.
fn database_url(db: Option<String>) -> Result<String> {
    match db {
        Some(db) => Ok(db),
        None => Ok(Settings::load(None)?.database_url),
    }
}

fn open_store(url: &str) -> Result<Store> {
    let store = Store::from_url(url).with_context(|| format!("failed to open database {url}"))?;
    store.init_schema()?;
    Ok(store)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(3)).collect();
        out.push_str("...");
        out
    }
}
