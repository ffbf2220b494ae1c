//! Content providers and page scraping.
//!
//! - [`registry`] - The [`ContentProvider`] trait and the registry the oracle
//!   picks providers from
//! - [`search`] - Web search provider (daedra)
//! - [`scrape`] - Full-page text fetching with bounded concurrency

/// Provider trait and registry.
pub mod registry;
/// Full-page scraping.
pub mod scrape;
/// Web search content provider.
pub mod search;

pub use registry::{ContentProvider, ToolRegistry};
pub use scrape::{PageScraper, Scraper};
pub use search::WebSearchProvider;
