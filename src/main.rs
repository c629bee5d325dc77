//! Rechtspraak crawler main entry point
//!
//! This is the command-line interface for incremental ingestion of Dutch case
//! law from the Open Data Rechtspraak API.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rechtspraak_crawler::config::{load_config_with_hash, Config};
use rechtspraak_crawler::crawler::{crawl, Coordinator};
use rechtspraak_crawler::output::{
    list_categories, load_statistics, print_categories, print_report, print_statistics,
};
use rechtspraak_crawler::storage::open_storage;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Rechtspraak crawler: incremental ingestion of Dutch case law
///
/// Discovers decisions that changed since a date for every authority of a
/// category, fetches their XML documents and stores them in SQLite.
#[derive(Parser, Debug)]
#[command(name = "rechtspraak-crawler")]
#[command(version = "1.0.0")]
#[command(about = "Incremental crawler for the Open Data Rechtspraak API", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG", default_value = "rechtspraak.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl all authorities of a category for decisions changed since a date
    Crawl {
        /// Authority category, e.g. "Rechtbank" (see the `categories` command)
        category: String,

        /// Only decisions modified on or after this date (YYYY-MM-DD)
        #[arg(value_parser = parse_date)]
        since: NaiveDate,

        /// Override the minimum delay between requests (milliseconds)
        #[arg(long, value_parser = clap::value_parser!(u64).range(100..))]
        delay_ms: Option<u64>,

        /// Override the number of requests in flight
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=16))]
        concurrency: Option<u32>,

        /// Re-fetch and overwrite decisions that are already stored
        #[arg(long)]
        refresh: bool,
    },

    /// Import decision documents from local XML files
    Import {
        /// XML files as returned by the content endpoint
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Show statistics from the database
    Stats,

    /// List the authority categories that can be crawled
    Categories,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| format!("expected a date as YYYY-MM-DD: {}", e))
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    match cli.command {
        Command::Crawl {
            category,
            since,
            delay_ms,
            concurrency,
            refresh,
        } => {
            if let Some(delay_ms) = delay_ms {
                config.crawler.delay_ms = delay_ms;
            }
            if let Some(concurrency) = concurrency {
                config.crawler.max_concurrent_requests = concurrency;
            }
            config.crawler.refresh_existing |= refresh;

            handle_crawl(&config, &config_hash, &category, since).await
        }
        Command::Import { files } => handle_import(&config, &config_hash, &files),
        Command::Stats => handle_stats(&config),
        Command::Categories => handle_categories(&config),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("rechtspraak_crawler=info,warn"),
            1 => EnvFilter::new("rechtspraak_crawler=debug,info"),
            2 => EnvFilter::new("rechtspraak_crawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the crawl command
///
/// Exits non-zero if discovery failed for any authority; item failures are
/// reported but do not change the exit code.
async fn handle_crawl(
    config: &Config,
    config_hash: &str,
    category: &str,
    since: NaiveDate,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing::info!(
        "Crawling {} since {} (delay {}ms, concurrency {}, refresh {})",
        category,
        since,
        config.crawler.delay_ms,
        config.crawler.max_concurrent_requests,
        config.crawler.refresh_existing
    );

    let report = match crawl(config, config_hash, category, since).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    print_report(&format!("Crawl {} since {}", category, since), &report);

    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::error!(
            "Discovery failed for {} authorities",
            report.discovery_failures.len()
        );
        Ok(ExitCode::FAILURE)
    }
}

/// Handles the import command
///
/// Uses the same coordinator as `crawl`, since `import_files` is a method on
/// it. The HTTP client and throttle it builds stay idle: building a reqwest
/// client opens no connections.
fn handle_import(
    config: &Config,
    config_hash: &str,
    files: &[PathBuf],
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let coordinator = Coordinator::from_config(config, config_hash)?;
    let report = coordinator.import_files(files)?;

    print_report(&format!("Import of {} files", files.len()), &report);

    Ok(ExitCode::SUCCESS)
}

/// Handles the stats command: shows statistics from the database
fn handle_stats(config: &Config) -> Result<ExitCode, Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(ExitCode::SUCCESS)
}

/// Handles the categories command
fn handle_categories(config: &Config) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let storage = open_storage(Path::new(&config.output.database_path))?;
    let categories = list_categories(&storage)?;
    print_categories(&categories);

    Ok(ExitCode::SUCCESS)
}
