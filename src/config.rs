// src/config.rs
// =============================================================================
// Runtime configuration and the on-disk layout of a harvest.
//
// Everything the crawler and the ingestion pipeline write lives under one
// output root:
//
//   <root>/data/                 raw page snapshots
//   <root>/site.txt              checkpoint ledgers, one per traversal level
//   <root>/group_categories.txt
//   <root>/categories.txt
//   <root>/sub_categories.txt
//   <root>/processed/chunk_<i>.json
//   <root>/cache.json            the merged dataset
//
// Rust concepts:
// - PathBuf: An owned, growable filesystem path
// - Duration: A span of time, used for timeouts and sleeps
// =============================================================================

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

// Number of snapshot files processed and cached together by the ingestor
pub const CHUNK_SIZE: usize = 1000;

// Pause after every successful request, to stay polite with the site
pub const THROTTLE_DELAY: Duration = Duration::from_millis(200);

// Settings that drive the crawl
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Base URL of the storefront (e.g. "https://shop.example.com")
    pub site_url: String,
    /// Width of the pagination worker pool (None = sequential pagination)
    pub workers: Option<usize>,
    /// Highest page number fetched for a single subcategory
    pub max_pages: u32,
    /// Per-request timeout
    pub timeout: Duration,
    /// Sleep between two attempts after a transient network error
    pub retry_sleep: Duration,
    /// Attempts before a URL is declared unreachable
    pub max_retries: u32,
    /// Sleep after each successful request
    pub throttle: Duration,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        CrawlSettings {
            site_url: String::new(),
            workers: None,
            max_pages: 1000,
            timeout: Duration::from_secs(10),
            retry_sleep: Duration::from_secs(60),
            max_retries: 5,
            throttle: THROTTLE_DELAY,
        }
    }
}

impl CrawlSettings {
    // Checks the settings before any request is made
    //
    // The site URL must be absolute http(s); a zero-width worker pool is
    // rejected because it could never fetch a page.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.site_url)
            .map_err(|e| anyhow!("Invalid site URL '{}': {}", self.site_url, e))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(anyhow!("Site URL must be http or https: {}", self.site_url));
        }

        if self.workers == Some(0) {
            return Err(anyhow!("Worker pool width must be at least 1"));
        }

        if self.max_retries == 0 {
            return Err(anyhow!("Max retries must be at least 1"));
        }

        Ok(())
    }
}

// The filesystem layout under the output root
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        OutputLayout { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.root.join("processed")
    }

    pub fn chunk_file(&self, index: usize) -> PathBuf {
        self.processed_dir().join(format!("chunk_{}.json", index))
    }

    pub fn cache_file(&self) -> PathBuf {
        self.root.join("cache.json")
    }

    // Creates the root, data/ and processed/ directories if they are missing
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.root.clone(), self.data_dir(), self.processed_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }
        Ok(())
    }
}

// Writes a file so that it either exists completely or not at all
//
// The content goes to a temporary sibling first and is then renamed into
// place. Rename within one directory is atomic, and the presence of these
// files is what marks work as done.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, contents).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move {} into place", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = CrawlSettings::default();
        assert_eq!(settings.max_pages, 1000);
        assert_eq!(settings.timeout, Duration::from_secs(10));
        assert_eq!(settings.retry_sleep, Duration::from_secs(60));
        assert_eq!(settings.max_retries, 5);
        assert!(settings.workers.is_none());
    }

    #[test]
    fn test_validate_rejects_relative_url() {
        let settings = CrawlSettings {
            site_url: "/not-a-site".to_string(),
            ..CrawlSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_pool() {
        let settings = CrawlSettings {
            site_url: "https://shop.example.com".to_string(),
            workers: Some(0),
            ..CrawlSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_layout_paths() {
        let layout = OutputLayout::new("/tmp/harvest");
        assert_eq!(layout.data_dir(), PathBuf::from("/tmp/harvest/data"));
        assert_eq!(
            layout.chunk_file(3),
            PathBuf::from("/tmp/harvest/processed/chunk_3.json")
        );
        assert_eq!(layout.cache_file(), PathBuf::from("/tmp/harvest/cache.json"));
    }

    #[test]
    fn test_write_atomic_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.json");
        write_atomic(&path, b"{}").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
        assert!(!dir.path().join("artifact.json.tmp").exists());
    }
}
