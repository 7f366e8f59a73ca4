// src/query/mod.rs
// =============================================================================
// This module runs structural queries against parsed storefront pages.
//
// Submodules:
// - html: The fixed selectors of the storefront and the helpers that apply them
//
// Rust concepts:
// - pub use: Re-export items to simplify imports for users of this module
// =============================================================================

mod html;

pub use html::PageQueries;
