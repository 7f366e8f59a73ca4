// src/fetch/http.rs
// =============================================================================
// This module fetches pages over HTTP with a persistent client session.
//
// Key functionality:
// - Reuses one reqwest Client (connection pooling) for the whole run
// - Sleeps a short, fixed delay after every successful request
// - Treats an error status (404, 410, 500, ...) as "page absent", not a failure
// - Retries network errors (timeouts, resets) after a backoff sleep
// - Gives up with FetchError::ConnectionExhausted after max_retries attempts
//
// Rust concepts:
// - async/await: For non-blocking network I/O
// - Result<T, E>: For error handling
// - loop with early return: The retry loop
// =============================================================================

use super::{FetchError, Fetcher, Page};
use crate::config::CrawlSettings;
use anyhow::Result;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

// How a single attempt ended
enum Attempt {
    Fetched(Page),
    Absent(u16),
    Transient(String),
}

// A fetcher backed by a reqwest Client
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
    retry_sleep: Duration,
    max_retries: u32,
    throttle: Duration,
}

impl HttpFetcher {
    // Creates a fetcher with a fresh client session
    pub fn new(settings: &CrawlSettings) -> Result<Self> {
        Ok(HttpFetcher {
            client: build_client(settings.timeout)?,
            timeout: settings.timeout,
            retry_sleep: settings.retry_sleep,
            max_retries: settings.max_retries,
            throttle: settings.throttle,
        })
    }

    // Makes one GET request and classifies the outcome
    async fn attempt(&self, url: &str) -> Attempt {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return Attempt::Transient(categorize_error(&e)),
        };

        let status = response.status();
        if !status.is_success() {
            return Attempt::Absent(status.as_u16());
        }

        // Take the final URL before the body consumes the response
        let final_url = response.url().to_string();
        match response.text().await {
            Ok(body) => Attempt::Fetched(Page { final_url, body }),
            Err(e) => Attempt::Transient(categorize_error(&e)),
        }
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Option<Page>, FetchError> {
        let mut errors = 0;

        while errors < self.max_retries {
            match self.attempt(url).await {
                Attempt::Fetched(page) => {
                    debug!(url, final_url = %page.final_url, "fetched");
                    tokio::time::sleep(self.throttle).await;
                    return Ok(Some(page));
                }
                Attempt::Absent(status) => {
                    warn!(url, status, "Page not found");
                    return Ok(None);
                }
                Attempt::Transient(reason) => {
                    errors += 1;
                    warn!(url, attempt = errors, max = self.max_retries, %reason, "request failed");
                    if errors < self.max_retries {
                        tokio::time::sleep(self.retry_sleep).await;
                    }
                }
            }
        }

        Err(FetchError::ConnectionExhausted {
            url: url.to_string(),
            attempts: errors,
        })
    }

    fn fork(&self) -> Result<Self> {
        Ok(HttpFetcher {
            client: build_client(self.timeout)?,
            timeout: self.timeout,
            retry_sleep: self.retry_sleep,
            max_retries: self.max_retries,
            throttle: self.throttle,
        })
    }
}

fn build_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()?;
    Ok(client)
}

// Turns a reqwest error into a short human-readable reason
fn categorize_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_redirect() {
        "too many redirects".to_string()
    } else if error.is_connect() {
        "connection failed".to_string()
    } else if error.is_body() || error.is_decode() {
        "failed to read body".to_string()
    } else {
        error.to_string()
    }
}
