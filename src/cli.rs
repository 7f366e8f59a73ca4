// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Two subcommands mirror the two halves of a harvest:
// - crawl:  walk the catalog tree and save one snapshot per listing page
// - ingest: turn the saved snapshots into one deduplicated dataset
//
// Every flag can also come from an environment variable, so a harvest can be
// configured once in the shell (SITE_URL, DATA_PATH, ...) and re-run after an
// interruption with no arguments at all.
//
// Rust concepts:
// - Structs: Custom data types that group related data
// - Enums: Types that can be one of several variants
// - Derive macros: Automatically generate code for our types
// =============================================================================

use crate::config::CrawlSettings;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "catalog-harvester",
    version = "0.1.0",
    about = "Harvest a storefront catalog into a deduplicated dataset",
    long_about = "catalog-harvester crawls the category tree of a storefront, saves every listing page, \
                  and converts the saved pages into a single deduplicated dataset. \
                  Both steps resume where they stopped when interrupted."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl the storefront and save listing page snapshots
    ///
    /// Example: catalog-harvester crawl --site-url https://shop.example.com --data-path ./harvest
    Crawl(CrawlArgs),

    /// Build the dataset from the saved snapshots
    ///
    /// Example: catalog-harvester ingest --data-path ./harvest --json
    Ingest {
        /// Output root used by the crawl
        #[arg(long, env = "DATA_PATH")]
        data_path: PathBuf,

        /// Print the dataset summary as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct CrawlArgs {
    /// Base URL of the storefront (e.g., https://shop.example.com)
    #[arg(long, env = "SITE_URL")]
    pub site_url: String,

    /// Output root for snapshots and checkpoint ledgers
    #[arg(long, env = "DATA_PATH")]
    pub data_path: PathBuf,

    /// Number of pagination workers; omit for sequential pagination
    #[arg(long, env = "CRAWL_WORKERS")]
    pub workers: Option<usize>,

    /// Highest page number fetched for one subcategory
    #[arg(long, env = "CRAWL_MAX_PAGES", default_value_t = 1000)]
    pub max_pages: u32,

    /// Per-request timeout in seconds
    #[arg(long, env = "CRAWL_TIMEOUT_SECS", default_value_t = 10)]
    pub timeout_secs: u64,

    /// Seconds to wait before retrying after a network error
    #[arg(long, env = "CRAWL_RETRY_SLEEP_SECS", default_value_t = 60)]
    pub retry_sleep_secs: u64,

    /// Attempts per URL before the run is aborted
    #[arg(long, env = "CRAWL_MAX_RETRIES", default_value_t = 5)]
    pub max_retries: u32,
}

impl CrawlArgs {
    // Converts the parsed flags into the settings used by the crawler
    pub fn settings(&self) -> CrawlSettings {
        CrawlSettings {
            site_url: self.site_url.clone(),
            workers: self.workers,
            max_pages: self.max_pages,
            timeout: Duration::from_secs(self.timeout_secs),
            retry_sleep: Duration::from_secs(self.retry_sleep_secs),
            max_retries: self.max_retries,
            ..CrawlSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crawl_defaults() {
        let cli = Cli::parse_from([
            "catalog-harvester",
            "crawl",
            "--site-url",
            "https://shop.example.com",
            "--data-path",
            "/tmp/harvest",
        ]);

        match cli.command {
            Commands::Crawl(args) => {
                let settings = args.settings();
                assert_eq!(settings.max_pages, 1000);
                assert_eq!(settings.timeout, Duration::from_secs(10));
                assert_eq!(settings.retry_sleep, Duration::from_secs(60));
                assert_eq!(settings.max_retries, 5);
                assert_eq!(settings.workers, None);
            }
            _ => panic!("expected crawl subcommand"),
        }
    }

    #[test]
    fn test_parse_crawl_workers() {
        let cli = Cli::parse_from([
            "catalog-harvester",
            "crawl",
            "--site-url",
            "https://shop.example.com",
            "--data-path",
            "/tmp/harvest",
            "--workers",
            "8",
        ]);

        match cli.command {
            Commands::Crawl(args) => assert_eq!(args.settings().workers, Some(8)),
            _ => panic!("expected crawl subcommand"),
        }
    }

    #[test]
    fn test_parse_ingest() {
        let cli = Cli::parse_from([
            "catalog-harvester",
            "ingest",
            "--data-path",
            "/tmp/harvest",
            "--json",
        ]);

        match cli.command {
            Commands::Ingest { data_path, json } => {
                assert_eq!(data_path, PathBuf::from("/tmp/harvest"));
                assert!(json);
            }
            _ => panic!("expected ingest subcommand"),
        }
    }
}
