// src/query/html.rs
// =============================================================================
// This module extracts the pieces of a storefront page the crawler needs.
//
// The catalog is four levels deep and every level is recognised by a fixed
// CSS selector:
// - home page:         links nested two lists deep in the menu -> groups
// - group page:        a[data-qa="categoryLinkCta"]            -> categories
// - category page:     a[data-qa="filterLinkCta"]              -> subcategories
// - subcategory page:  the <script> inside #fragment-listing   -> product payload
//
// A listing past the last page shows a "products-no-results" block instead.
//
// We use the `scraper` crate which:
// - Parses HTML into a DOM (Document Object Model)
// - Supports CSS selectors for finding elements
// =============================================================================

use anyhow::{anyhow, Result};
use scraper::{Html, Selector};

// The compiled selectors of the storefront
pub struct PageQueries {
    group_links: Selector,
    category_links: Selector,
    subcategory_links: Selector,
    listing_script: Selector,
    no_products: Selector,
}

impl PageQueries {
    pub fn new() -> Result<Self> {
        Ok(PageQueries {
            group_links: compile("div > ul > li > ul > li > a[href]")?,
            category_links: compile(r#"a[data-qa="categoryLinkCta"][href]"#)?,
            subcategory_links: compile(r#"a[data-qa="filterLinkCta"][href]"#)?,
            listing_script: compile("div#fragment-listing > script")?,
            // Exact attribute match: the block carries this single class
            no_products: compile(r#"div[class="products-no-results"]"#)?,
        })
    }

    /// Group links of the home page
    pub fn group_links(&self, document: &Html) -> Vec<String> {
        attr_values(document, &self.group_links, "href")
    }

    /// Category links of a group page
    pub fn category_links(&self, document: &Html) -> Vec<String> {
        attr_values(document, &self.category_links, "href")
    }

    /// Subcategory (filter) links of a category page
    pub fn subcategory_links(&self, document: &Html) -> Vec<String> {
        attr_values(document, &self.subcategory_links, "href")
    }

    /// The raw text of the embedded listing script, None if there is none
    pub fn listing_payload(&self, document: &Html) -> Option<String> {
        let payload: String = document
            .select(&self.listing_script)
            .flat_map(|script| script.text())
            .collect();

        if payload.trim().is_empty() {
            None
        } else {
            Some(payload)
        }
    }

    /// Whether the page says it has no products
    pub fn has_no_products(&self, document: &Html) -> bool {
        document.select(&self.no_products).next().is_some()
    }
}

fn compile(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector '{}': {:?}", css, e))
}

// Collects an attribute of every matching element, trimmed, skipping empty values
fn attr_values(document: &Html, selector: &Selector, attr: &str) -> Vec<String> {
    document
        .select(selector)
        .filter_map(|element| element.value().attr(attr))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}
