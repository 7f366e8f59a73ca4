// src/crawl/mod.rs
// =============================================================================
// This module walks the storefront catalog and saves every listing page.
//
// Features:
// - Depth-first descent: site -> group -> category -> subcategory -> pages
// - Checkpoints after every finished node, so a re-run skips finished subtrees
// - Sequential or windowed concurrent pagination
// - One bad page stops only its own subcategory, never the whole crawl
//
// Rust concepts:
// - Generics with trait bounds: The controller works with any fetcher and store
// - Async programming: For concurrent network requests
// =============================================================================

mod controller;

pub use controller::CrawlController;
