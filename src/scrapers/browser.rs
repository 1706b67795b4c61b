use crate::scrapers::listing::StabilityTracker;
use crate::scrapers::traits::PageFetcher;
use crate::scrapers::types::ScrapeParams;
use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::browser::tab::{RequestInterceptor, RequestPausedDecision};
use headless_chrome::browser::transport::{SessionId, Transport};
use headless_chrome::protocol::cdp::Fetch::events::RequestPausedEvent;
use headless_chrome::protocol::cdp::Fetch::{FailRequest, RequestPattern, RequestStage};
use headless_chrome::protocol::cdp::Network::{ErrorReason, ResourceType};
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Any of these marks the inventory grid as present
const GRID_SELECTORS: [&str; 5] = [
    "[class*='listing']",
    ".inventory",
    ".inventory-grid",
    ".results",
    "main",
];

/// Detail pages render title, price and payment blocks separately
const DETAIL_SELECTORS: [&str; 5] = [
    "h1, h2, .product-title",
    ".price, .our-price, .sale-price, [class*='price']",
    "[id*='price']",
    "[class*='payment'], [id*='payment']",
    ".content, main, [role='main']",
];

const SELECTOR_WAIT: Duration = Duration::from_secs(2);
const SCROLL_SETTLE: Duration = Duration::from_millis(2500);
const LOAD_MORE_SETTLE: Duration = Duration::from_millis(4000);
const DETAIL_SETTLE: Duration = Duration::from_millis(3000);

const SCROLL_LISTING_JS: &str = r#"
(async () => {
    const step = () => new Promise(r => {
        window.scrollBy(0, Math.max(600, innerHeight * 0.95));
        setTimeout(r, 140);
    });
    for (let i = 0; i < 10; i++) await step();
    return true;
})()
"#;

const SCROLL_DETAIL_JS: &str = r#"
(async () => {
    const step = () => new Promise(r => {
        window.scrollBy(0, Math.max(400, innerHeight * 0.9));
        setTimeout(r, 120);
    });
    for (let i = 0; i < 6; i++) await step();
    window.scrollTo(0, 0);
    return true;
})()
"#;

const CLICK_LOAD_MORE_JS: &str = r#"
(() => {
    const visible = el => !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
    const byText = Array.from(document.querySelectorAll("button, a"))
        .filter(el => /(load|show)\s+more/i.test(el.textContent || ""));
    const bySelector = Array.from(document.querySelectorAll("[data-action='load-more'], .load-more, .show-more"));
    const target = byText.concat(bySelector).find(visible);
    if (!target) return false;
    target.click();
    return true;
})()
"#;

const COUNT_LINKS_JS: &str = r#"
(() => {
    const a1 = Array.from(document.querySelectorAll("a[href*='/product/']"));
    const a2 = Array.from(document.querySelectorAll("a,button"))
        .filter(el => /view\s+details/i.test(el.textContent || ""));
    const hrefs = new Set(a1.map(a => a.href).concat(a2.map(el => el.href).filter(Boolean)));
    return hrefs.size;
})()
"#;

/// Headless Chrome session that renders listing and detail pages
pub struct ListingBrowser {
    browser: Browser,
    params: ScrapeParams,
    dumped: AtomicBool,
}

impl ListingBrowser {
    /// Launch headless Chrome for this run
    pub fn launch(params: &ScrapeParams) -> Result<Self> {
        info!("Launching headless Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((1366, 900)))
            .idle_browser_timeout(params.page_timeout * 2)
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;

        Ok(Self {
            browser,
            params: params.clone(),
            dumped: AtomicBool::new(false),
        })
    }

    fn open_tab(&self) -> Result<Arc<Tab>> {
        let tab = self.browser.new_tab().context("Failed to open tab")?;
        tab.set_default_timeout(self.params.page_timeout);
        tab.set_user_agent(
            &self.params.user_agent,
            Some(self.params.accept_language.as_str()),
            None,
        )
        .context("Failed to set user agent")?;

        let mut headers = HashMap::new();
        headers.insert("Referer", self.params.listing_url.as_str());
        tab.set_extra_http_headers(headers)
            .context("Failed to set extra headers")?;
        Ok(tab)
    }

    /// Load a listing page, scroll until no more cards appear and return its HTML
    pub fn load_listing_page(&self, url: &str) -> Result<String> {
        info!("Opening listing page {}", url);
        let tab = self.open_tab()?;
        let result = self.render_listing(&tab, url);
        let _ = tab.close(true);
        result
    }

    fn render_listing(&self, tab: &Tab, url: &str) -> Result<String> {
        tab.navigate_to(url)?;
        tab.wait_until_navigated()
            .with_context(|| format!("Navigation to {url} timed out"))?;

        for selector in GRID_SELECTORS {
            if tab
                .wait_for_element_with_custom_timeout(selector, SELECTOR_WAIT)
                .is_ok()
            {
                debug!("Grid present via '{}'", selector);
                break;
            }
        }

        self.autoscroll_until_stable(tab)?;

        let html = tab.get_content().context("Failed to read page HTML")?;
        self.dump_debug(tab, &html);
        Ok(html)
    }

    /// Scroll in bursts, clicking "Load More" where offered, until the
    /// product-link count stops changing
    fn autoscroll_until_stable(&self, tab: &Tab) -> Result<()> {
        let mut tracker = StabilityTracker::new(self.params.min_stable_cycles);

        for round in 0..self.params.max_scroll_loops {
            tab.evaluate(SCROLL_LISTING_JS, true)
                .context("Scroll script failed")?;
            thread::sleep(SCROLL_SETTLE);

            let clicked = tab
                .evaluate(CLICK_LOAD_MORE_JS, false)
                .ok()
                .and_then(|r| r.value)
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            if clicked {
                debug!("Clicked a load-more control");
                thread::sleep(LOAD_MORE_SETTLE);
            }

            let count = tab
                .evaluate(COUNT_LINKS_JS, false)
                .ok()
                .and_then(|r| r.value)
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as usize;
            debug!("Scroll round {}: {} product links", round + 1, count);

            if tracker.observe(count) {
                info!("Link count settled at {} after {} rounds", count, round + 1);
                return Ok(());
            }
        }

        warn!(
            "Link count still changing after {} scroll rounds",
            self.params.max_scroll_loops
        );
        Ok(())
    }

    /// Load a detail page, give the price and payment widgets time to render
    pub fn load_detail_page(&self, url: &str) -> Result<String> {
        debug!("Opening detail page {}", url);
        let tab = self.open_tab()?;
        if self.params.block_detail_assets {
            if let Err(e) = block_assets(&tab) {
                warn!("Could not block assets on {}: {:#}", url, e);
            }
        }
        let result = self.render_detail(&tab, url);
        let _ = tab.close(true);
        result
    }

    fn render_detail(&self, tab: &Tab, url: &str) -> Result<String> {
        tab.navigate_to(url)?;
        tab.wait_until_navigated()
            .with_context(|| format!("Navigation to {url} timed out"))?;

        for selector in DETAIL_SELECTORS {
            let _ = tab.wait_for_element_with_custom_timeout(selector, SELECTOR_WAIT);
        }
        if let Err(e) = tab.evaluate(SCROLL_DETAIL_JS, true) {
            debug!("Detail scroll failed on {}: {}", url, e);
        }
        thread::sleep(DETAIL_SETTLE);

        tab.get_content().context("Failed to read page HTML")
    }

    /// Save the first listing page's HTML and a screenshot when a debug dir is set
    fn dump_debug(&self, tab: &Tab, html: &str) {
        let Some(dir) = &self.params.debug_dir else {
            return;
        };
        if self.dumped.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = write_debug_files(tab, dir, html) {
            warn!("Could not write debug files: {:#}", e);
        }
    }
}

/// Images, media, fonts and stylesheets are never read from a detail page
fn is_blocked_resource(kind: &ResourceType) -> bool {
    matches!(
        kind,
        ResourceType::Image | ResourceType::Media | ResourceType::Font | ResourceType::Stylesheet
    )
}

fn blocked_patterns() -> Vec<RequestPattern> {
    [
        ResourceType::Image,
        ResourceType::Media,
        ResourceType::Font,
        ResourceType::Stylesheet,
    ]
    .into_iter()
    .map(|kind| RequestPattern {
        url_pattern: None,
        resource_Type: Some(kind),
        request_stage: Some(RequestStage::Request),
    })
    .collect()
}

fn block_assets(tab: &Tab) -> Result<()> {
    let patterns = blocked_patterns();
    tab.enable_fetch(Some(patterns.as_slice()), None)
        .context("Failed to enable request interception")?;

    let interceptor: Arc<dyn RequestInterceptor + Send + Sync> = Arc::new(
        |_transport: Arc<Transport>, _session: SessionId, event: RequestPausedEvent| {
            if is_blocked_resource(&event.params.resource_Type) {
                RequestPausedDecision::Fail(FailRequest {
                    request_id: event.params.request_id,
                    error_reason: ErrorReason::BlockedByClient,
                })
            } else {
                RequestPausedDecision::Continue(None)
            }
        },
    );
    tab.enable_request_interception(interceptor)
        .context("Failed to install request interceptor")?;
    Ok(())
}

fn write_debug_files(tab: &Tab, dir: &Path, html: &str) -> Result<()> {
    std::fs::create_dir_all(dir)?;

    let html_path = dir.join("listing_page.html");
    std::fs::write(&html_path, html)?;
    info!("Saved page HTML to {} ({} bytes)", html_path.display(), html.len());

    let screenshot = tab.capture_screenshot(
        Page::CaptureScreenshotFormatOption::Png,
        None,
        None,
        true,
    )?;
    let shot_path = dir.join("listing_screenshot.png");
    std::fs::write(&shot_path, screenshot)?;
    info!("Saved screenshot to {}", shot_path.display());
    Ok(())
}

/// `PageFetcher` over a shared `ListingBrowser`; headless_chrome calls are
/// blocking, so each load runs on the blocking pool
#[derive(Clone)]
pub struct BrowserFetcher {
    browser: Arc<ListingBrowser>,
}

impl BrowserFetcher {
    pub fn new(browser: ListingBrowser) -> Self {
        Self {
            browser: Arc::new(browser),
        }
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch_listing(&self, url: &str) -> Result<String> {
        let browser = Arc::clone(&self.browser);
        let url = url.to_string();
        tokio::task::spawn_blocking(move || browser.load_listing_page(&url))
            .await
            .context("Browser task panicked")?
    }

    async fn fetch_detail(&self, url: &str) -> Result<String> {
        let browser = Arc::clone(&self.browser);
        let url = url.to_string();
        tokio::task::spawn_blocking(move || browser.load_detail_page(&url))
            .await
            .context("Browser task panicked")?
    }

    fn source_name(&self) -> &'static str {
        "headless-chrome"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_asset_requests_are_blocked() {
        assert!(is_blocked_resource(&ResourceType::Image));
        assert!(is_blocked_resource(&ResourceType::Stylesheet));
        assert!(!is_blocked_resource(&ResourceType::Document));
        assert!(!is_blocked_resource(&ResourceType::Script));
        assert!(!is_blocked_resource(&ResourceType::Xhr));
    }

    #[test]
    fn patterns_pause_blocked_kinds_before_sending() {
        let patterns = blocked_patterns();
        assert_eq!(patterns.len(), 4);
        assert!(patterns.iter().all(|p| {
            p.url_pattern.is_none()
                && matches!(p.request_stage, Some(RequestStage::Request))
                && p.resource_Type.as_ref().is_some_and(is_blocked_resource)
        }));
    }
}
