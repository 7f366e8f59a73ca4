// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Set up logging (tracing, filtered by RUST_LOG, written to stderr)
// 2. Parse command-line arguments using clap
// 3. Dispatch to the crawl or ingest handler
// 4. Exit with proper code (0 = success, 2 = error)
//
// Both subcommands are resumable: run them again after an interruption and
// they continue from the last recorded checkpoint.
//
// Rust concepts used:
// - async/await: The crawl makes many network requests
// - Result<T, E>: Errors travel up to run() with the ? operator
// - Generics: The crawl controller is built from concrete fetcher and stores here
// =============================================================================

// Module declarations - tells Rust about our other source files
mod cli;      // src/cli.rs - command-line parsing
mod config;   // src/config.rs - settings and output layout
mod crawl;    // src/crawl/ - catalog traversal and pagination
mod fetch;    // src/fetch/ - HTTP with retries
mod ingest;   // src/ingest/ - snapshots to dataset
mod query;    // src/query/ - CSS queries over listing pages
mod store;    // src/store/ - checkpoints and snapshots

use anyhow::Result;
use clap::Parser;
use cli::{Cli, CrawlArgs, Commands};
use config::OutputLayout;
use crawl::CrawlController;
use fetch::HttpFetcher;
use ingest::Table;
use std::path::Path;
use store::{FileCheckpointStore, FileSnapshotStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    init_logging();

    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            // {:#} prints the whole context chain on one line
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// Logs go to stderr so that --json output on stdout stays clean
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl(args) => handle_crawl(&args).await,
        Commands::Ingest { data_path, json } => handle_ingest(&data_path, json),
    }
}

// Handles the 'crawl' subcommand
async fn handle_crawl(args: &CrawlArgs) -> Result<i32> {
    let settings = args.settings();
    settings.validate()?;

    let layout = OutputLayout::new(&args.data_path);
    layout.ensure_dirs()?;

    println!("🔍 Crawling: {}", settings.site_url);
    match settings.workers {
        Some(width) => println!("👷 Pagination workers: {}", width),
        None => println!("👷 Pagination: sequential"),
    }
    info!("Output root: {}", layout.root().display());

    let controller = CrawlController::new(
        &settings,
        HttpFetcher::new(&settings)?,
        FileCheckpointStore::new(layout.root()),
        FileSnapshotStore::new(layout.data_dir()),
    )?;
    let saved = controller.run().await?;

    println!("📄 Saved {} listing page(s) to {}", saved, layout.data_dir().display());
    Ok(0)
}

// Handles the 'ingest' subcommand
fn handle_ingest(data_path: &Path, json: bool) -> Result<i32> {
    let layout = OutputLayout::new(data_path);
    layout.ensure_dirs()?;

    let dataset = ingest::build_dataset(&layout)?;
    if dataset.is_empty() {
        warn!("No records found under {}", layout.data_dir().display());
    }

    if json {
        print_json(&dataset)?;
    } else {
        print_table(&dataset, &layout);
    }
    Ok(0)
}

// Prints the dataset shape as JSON
fn print_json(dataset: &Table) -> Result<()> {
    let summary = serde_json::json!({
        "rows": dataset.len(),
        "columns": dataset.columns,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

// Prints the dataset schema as a human-readable table
fn print_table(dataset: &Table, layout: &OutputLayout) {
    println!("{:<30} {:<12}", "COLUMN", "TYPE");
    println!("{}", "=".repeat(42));

    for column in &dataset.columns {
        println!("{:<30} {:<12}", column.name, column.kind.to_string());
    }

    println!();
    println!("📊 Summary:");
    println!("   📋 Records: {}", dataset.len());
    println!("   🗂️  Columns: {}", dataset.columns.len());
    println!("   💾 Cached at: {}", layout.cache_file().display());
}
