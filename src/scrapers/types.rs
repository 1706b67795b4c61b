use super::listing::site_domain_of;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LISTING_URL: &str =
    "https://www.parrisrv.com/used-rvs-for-sale?s=true&lots=1232&pagesize=72&sort=year-asc";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Parameters for one scrape run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeParams {
    /// Listing page with the grid of units
    pub listing_url: String,
    /// Upper bound on listing pages visited
    pub max_pages: usize,
    /// Detail links must be hosted on this domain
    pub site_domain: String,
    pub user_agent: String,
    pub accept_language: String,
    /// Navigation timeout per page
    pub page_timeout: Duration,
    /// Equal link counts in a row before lazy loading counts as done
    pub min_stable_cycles: usize,
    /// Hard cap on scroll rounds per listing page
    pub max_scroll_loops: usize,
    /// Extra attempts for plain HTTP fetches
    pub http_retries: u32,
    pub http_timeout: Duration,
    /// Pause between page loads
    pub request_delay: Duration,
    /// Render pages in headless Chrome instead of plain HTTP
    pub use_browser: bool,
    /// Refuse image, media, font and stylesheet requests on detail pages
    pub block_detail_assets: bool,
    /// Where to dump the first listing page's HTML and screenshot
    pub debug_dir: Option<PathBuf>,
}

impl ScrapeParams {
    pub fn for_url(listing_url: &str) -> Self {
        Self {
            listing_url: listing_url.to_string(),
            site_domain: site_domain_of(listing_url),
            ..Self::default()
        }
    }
}

impl Default for ScrapeParams {
    fn default() -> Self {
        Self {
            listing_url: DEFAULT_LISTING_URL.to_string(),
            max_pages: 12,
            site_domain: site_domain_of(DEFAULT_LISTING_URL),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            page_timeout: Duration::from_secs(60),
            min_stable_cycles: 3,
            max_scroll_loops: 60,
            http_retries: 2,
            http_timeout: Duration::from_secs(25),
            request_delay: Duration::from_millis(200),
            use_browser: true,
            block_detail_assets: true,
            debug_dir: None,
        }
    }
}
