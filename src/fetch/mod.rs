// src/fetch/mod.rs
// =============================================================================
// This module issues the HTTP requests of a crawl.
//
// Submodules:
// - http: The reqwest-backed fetcher with timeout, retry and throttling
//
// The crawler never talks to reqwest directly. It goes through the Fetcher
// trait defined here, so tests can replace the network with a fake site.
//
// Rust concepts:
// - Traits: Shared behaviour that several types can implement
// - async fn in traits: Lets the trait describe an asynchronous operation
// - thiserror: Derives std::error::Error for our own error enum
// =============================================================================

mod http;

pub use http::HttpFetcher;

use scraper::Html;
use thiserror::Error;

// A successfully fetched page
//
// final_url is the URL after any redirects the server applied. The crawler
// compares it with the requested URL to detect redirect loops.
#[derive(Debug, Clone)]
pub struct Page {
    pub final_url: String,
    pub body: String,
}

impl Page {
    // Parses the body into an HTML document for querying
    pub fn document(&self) -> Html {
        Html::parse_document(&self.body)
    }
}

// The one failure that is allowed to abort a whole run
#[derive(Debug, Error)]
pub enum FetchError {
    /// Every attempt to reach the URL failed with a network error
    #[error("Connection error: {url} (gave up after {attempts} attempts)")]
    ConnectionExhausted { url: String, attempts: u32 },
}

// Something that can fetch pages
//
// fetch returns:
//   Ok(Some(page)) = the page was retrieved
//   Ok(None)       = the server answered with an error status (page absent)
//   Err(..)        = the site could not be reached at all
pub trait Fetcher {
    async fn fetch(&self, url: &str) -> Result<Option<Page>, FetchError>;

    /// Creates a fetcher with its own connection session, for one pagination worker
    fn fork(&self) -> anyhow::Result<Self>
    where
        Self: Sized;
}
