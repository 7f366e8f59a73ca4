// src/crawl/controller.rs
// =============================================================================
// The crawl state machine.
//
// How it works:
// 1. Fetch the home page and list the groups
// 2. For every group not in the ledger: list its categories, recurse, record it
// 3. For every category not in the ledger: list its subcategories, recurse, record it
// 4. For every subcategory not in the ledger: paginate, record it
//
// A node is recorded only after all of its children, so a crash anywhere
// leaves the node unrecorded and the next run picks it up again.
//
// Pagination:
// - Sequential: pages n, n+1, n+2, ... until one page says stop
// - Concurrent (N workers): page 1 alone, then windows of N pages joined
//   together; the next window starts only if every page of this one said
//   "continue"
// In both modes pagination resumes at the first page without a snapshot.
//
// Failure isolation:
// - Connection exhausted: propagated, aborts the run
// - Anything else while handling one page: logged, stops that subcategory
// =============================================================================

use crate::config::CrawlSettings;
use crate::fetch::{FetchError, Fetcher};
use crate::query::PageQueries;
use crate::store::{CheckpointStore, Level, SnapshotStore};
use anyhow::{Context, Result};
use futures::future::join_all;
use tracing::{error, info, warn};
use url::Url;

pub struct CrawlController<F, C, S> {
    site_url: String,
    fetcher: F,
    // One independent session per pagination worker; empty = sequential mode
    workers: Vec<F>,
    checkpoints: C,
    snapshots: S,
    queries: PageQueries,
    max_pages: u32,
}

impl<F, C, S> CrawlController<F, C, S>
where
    F: Fetcher,
    C: CheckpointStore,
    S: SnapshotStore,
{
    pub fn new(settings: &CrawlSettings, fetcher: F, checkpoints: C, snapshots: S) -> Result<Self> {
        let workers = match settings.workers {
            Some(width) => (0..width)
                .map(|_| fetcher.fork())
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        Ok(CrawlController {
            site_url: settings.site_url.clone(),
            fetcher,
            workers,
            checkpoints,
            snapshots,
            queries: PageQueries::new()?,
            max_pages: settings.max_pages,
        })
    }

    // Crawls the whole site
    //
    // Returns: the number of listing pages saved during this run
    pub async fn run(&self) -> Result<usize> {
        let site = self.site_url.as_str();
        if self.checkpoints.is_finished(Level::Site, site)? {
            info!("{} is already fully crawled", site);
            return Ok(0);
        }

        let Some(home) = self.fetcher.fetch(site).await? else {
            warn!("Home page not found: {}", site);
            return Ok(0);
        };
        let groups = self.queries.group_links(&home.document());
        info!("{} group(s) found", groups.len());
        // A maintenance page has no menu; recording it would end the crawl for good
        if groups.is_empty() {
            warn!("No groups on the home page of {}", site);
            return Ok(0);
        }

        let mut saved = 0;
        for (i, group) in groups.iter().enumerate() {
            info!("{} ({}/{})", group, i + 1, groups.len());
            if self.checkpoints.is_finished(Level::Group, group)? {
                continue;
            }
            saved += self.crawl_group(group).await?;
            self.checkpoints.mark_finished(Level::Group, group)?;
        }

        self.checkpoints.mark_finished(Level::Site, site)?;
        Ok(saved)
    }

    // Groups are the second level of the home page menu
    async fn crawl_group(&self, path: &str) -> Result<usize> {
        let Some(page) = self.fetcher.fetch(&self.absolute(path)).await? else {
            return Ok(0);
        };
        let categories = self.queries.category_links(&page.document());

        let mut saved = 0;
        for category in &categories {
            info!("  {}", category);
            if self.checkpoints.is_finished(Level::Category, category)? {
                continue;
            }
            saved += self.crawl_category(category).await?;
            self.checkpoints.mark_finished(Level::Category, category)?;
        }
        Ok(saved)
    }

    // Categories are the lowest level reachable from the menu; their
    // subcategories are the filter links on the category page
    async fn crawl_category(&self, path: &str) -> Result<usize> {
        let Some(page) = self.fetcher.fetch(&self.absolute(path)).await? else {
            return Ok(0);
        };
        let subcategories = self.queries.subcategory_links(&page.document());

        let mut saved = 0;
        for subcategory in &subcategories {
            info!("    {}", subcategory);
            if self.checkpoints.is_finished(Level::Subcategory, subcategory)? {
                continue;
            }
            saved += self.paginate(subcategory).await?;
            self.checkpoints.mark_finished(Level::Subcategory, subcategory)?;
        }
        Ok(saved)
    }

    // Fetches the pages of one subcategory until pagination stops
    async fn paginate(&self, subcategory: &str) -> Result<usize> {
        let start = self.resume_page(subcategory);
        if start > 1 {
            info!("      resuming at page {}", start);
        }

        if self.workers.is_empty() {
            let mut page = start;
            let mut saved = 0;
            while self.try_fetch_page(&self.fetcher, subcategory, page).await? {
                saved += 1;
                page += 1;
            }
            Ok(saved)
        } else {
            self.paginate_concurrent(subcategory, start).await
        }
    }

    async fn paginate_concurrent(&self, subcategory: &str, start: u32) -> Result<usize> {
        let mut page = start;
        let mut saved = 0;

        // Page 1 alone establishes that the listing exists at all
        if page == 1 {
            if !self.try_fetch_page(&self.workers[0], subcategory, 1).await? {
                return Ok(0);
            }
            saved += 1;
            page = 2;
        }

        loop {
            let window = self
                .workers
                .iter()
                .zip(page..)
                .map(|(worker, n)| self.try_fetch_page(worker, subcategory, n));

            let mut more = true;
            for outcome in join_all(window).await {
                if outcome? {
                    saved += 1;
                } else {
                    more = false;
                }
            }

            if !more {
                return Ok(saved);
            }
            page += self.workers.len() as u32;
        }
    }

    // The first page of a subcategory that has no snapshot yet
    fn resume_page(&self, subcategory: &str) -> u32 {
        (1..=self.max_pages)
            .find(|page| !self.snapshots.exists(subcategory, *page))
            .unwrap_or(self.max_pages + 1)
    }

    // Runs fetch_page, absorbing every failure except connection exhaustion
    async fn try_fetch_page(&self, fetcher: &F, subcategory: &str, page: u32) -> Result<bool> {
        match self.fetch_page(fetcher, subcategory, page).await {
            Ok(more) => Ok(more),
            Err(e) if e.is::<FetchError>() => Err(e),
            Err(e) => {
                error!("{} page {}: {:#}", subcategory, page, e);
                Ok(false)
            }
        }
    }

    // Fetches and saves one listing page
    //
    // Returns:
    //   Ok(true)  = the page was saved, the next one is worth trying
    //   Ok(false) = pagination of this subcategory should stop
    async fn fetch_page(&self, fetcher: &F, subcategory: &str, page: u32) -> Result<bool> {
        if page > self.max_pages {
            return Ok(false);
        }

        if self.snapshots.exists(subcategory, page) {
            return Ok(false);
        }

        let url = self.absolute(&page_target(subcategory, page));
        let requested = Url::parse(&url).with_context(|| format!("Invalid page URL {}", url))?;

        let Some(fetched) = fetcher.fetch(&url).await? else {
            return Ok(false);
        };

        // The site sends invalid page numbers back to the first page; following
        // that would loop forever
        if !lands_on(&requested, &fetched.final_url) {
            warn!("{} redirected to {}, stopping", url, fetched.final_url);
            return Ok(false);
        }

        let document = fetched.document();
        if self.queries.has_no_products(&document) {
            return Ok(false);
        }

        let Some(payload) = self.queries.listing_payload(&document) else {
            warn!("No listing payload on {}", url);
            return Ok(false);
        };

        self.snapshots.save(subcategory, page, &payload)?;
        info!("      page {}", page);
        Ok(true)
    }

    // Turns a site-relative link into an absolute URL
    fn absolute(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.site_url.trim_end_matches('/'), path)
        } else {
            format!("{}/{}", self.site_url.trim_end_matches('/'), path)
        }
    }

    #[cfg(test)]
    fn checkpoints(&self) -> &C {
        &self.checkpoints
    }

    #[cfg(test)]
    fn snapshots(&self) -> &S {
        &self.snapshots
    }
}

// The link to request for a page: the bare path for page 1, ?page=N after
fn page_target(subcategory: &str, page: u32) -> String {
    if page == 1 {
        subcategory.to_string()
    } else if subcategory.contains('?') {
        format!("{}&page={}", subcategory, page)
    } else {
        format!("{}?page={}", subcategory, page)
    }
}

// Whether the server answered the page that was asked for
//
// The path must match and every query pair of the request must survive;
// extra pairs added by the server are fine.
fn lands_on(requested: &Url, final_url: &str) -> bool {
    let Ok(landed) = Url::parse(final_url) else {
        return false;
    };
    let landed_pairs: Vec<_> = landed.query_pairs().collect();
    landed.path().trim_end_matches('/') == requested.path().trim_end_matches('/')
        && requested
            .query_pairs()
            .all(|(key, value)| landed_pairs.iter().any(|(k, v)| *k == key && *v == value))
}
