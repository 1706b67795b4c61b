use anyhow::Result;
use async_trait::async_trait;

/// Common trait for anything that can hand back a page's HTML.
/// Listing and detail pages need different loading (lazy-load scrolling vs
/// waiting for the price block), so they get separate methods.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fully loaded HTML of a listing (grid) page
    async fn fetch_listing(&self, url: &str) -> Result<String>;

    /// HTML of a unit detail page
    async fn fetch_detail(&self, url: &str) -> Result<String>;

    /// Get the name of the fetcher for logs
    fn source_name(&self) -> &'static str;
}
