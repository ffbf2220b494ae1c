//! Full-text page scraping.

use crate::types::ScrapedPage;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Interval, MissedTickBehavior};

/// Fetches the full text of pages.
///
/// Best-effort: pages that fail to load are left out of the result, so the
/// returned list may be shorter than `urls` and in a different order.
#[async_trait]
pub trait Scraper: Send + Sync {
    async fn fetch_full_text(&self, urls: &[String]) -> Vec<ScrapedPage>;
}

/// Scraper backed by daedra's page fetcher, converting pages to markdown.
pub struct PageScraper {
    max_concurrency: usize,
    ticker: Option<Mutex<Interval>>,
}

impl PageScraper {
    /// `requests_per_second` of 0 disables rate limiting. Must be called
    /// inside a tokio runtime.
    pub fn new(max_concurrency: usize, requests_per_second: u32) -> Self {
        let ticker = (requests_per_second > 0).then(|| {
            let period = Duration::from_secs_f64(1.0 / f64::from(requests_per_second));
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            Mutex::new(interval)
        });

        Self {
            max_concurrency: max_concurrency.max(1),
            ticker,
        }
    }

    async fn fetch_one(&self, url: String) -> Option<ScrapedPage> {
        if let Some(ticker) = &self.ticker {
            ticker.lock().await.tick().await;
        }

        let args = daedra::VisitPageArgs {
            url: url.clone(),
            include_images: false,
            selector: None,
        };

        match daedra::tools::fetch::fetch_page(&args).await {
            Ok(page) => Some(ScrapedPage {
                url,
                full_text: page.content,
            }),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Failed to scrape page");
                None
            }
        }
    }
}

impl Default for PageScraper {
    fn default() -> Self {
        Self::new(4, 5)
    }
}

#[async_trait]
impl Scraper for PageScraper {
    async fn fetch_full_text(&self, urls: &[String]) -> Vec<ScrapedPage> {
        if urls.is_empty() {
            return Vec::new();
        }

        let pages: Vec<ScrapedPage> = stream::iter(urls.iter().cloned())
            .map(|url| self.fetch_one(url))
            .buffer_unordered(self.max_concurrency)
            .filter_map(|page| async move { page })
            .collect()
            .await;

        tracing::info!(
            requested = urls.len(),
            scraped = pages.len(),
            "Scraped pages to enrich content"
        );
        pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_url_list_makes_no_requests() {
        let scraper = PageScraper::default();
        assert!(scraper.fetch_full_text(&[]).await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrency_floor() {
        let scraper = PageScraper::new(0, 0);
        assert_eq!(scraper.max_concurrency, 1);
        assert!(scraper.ticker.is_none());
    }
}
