use crate::scrapers::traits::PageFetcher;
use crate::scrapers::types::ScrapeParams;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Plain HTTP fetcher, used as the fallback for detail pages the browser
/// could not render and for `--no-browser` runs
pub struct HttpFetcher {
    client: Client,
    retries: u32,
}

impl HttpFetcher {
    pub fn new(params: &ScrapeParams) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&params.accept_language).context("Invalid Accept-Language")?,
        );
        if let Some(origin) = site_origin(&params.listing_url) {
            headers.insert(
                REFERER,
                HeaderValue::from_str(&origin).context("Invalid Referer")?,
            );
        }

        let client = Client::builder()
            .timeout(params.http_timeout)
            .user_agent(&params.user_agent)
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            retries: params.http_retries,
        })
    }

    async fn get_with_retries(&self, url: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self.get_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) if attempt < self.retries => {
                    warn!("Fetch of {} failed (attempt {}): {:#}", url, attempt + 1, e);
                    let backoff = Duration::from_millis(500 * (u64::from(attempt) + 1));
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_once(&self, url: &str) -> Result<String> {
        debug!("Fetching URL: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {url}"))?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to fetch {}: {}", url, response.status());
        }

        let html = response.text().await.context("Failed to read response body")?;
        debug!("Downloaded {} bytes of HTML", html.len());
        Ok(html)
    }
}

/// `https://host/` of a URL, sent as Referer
fn site_origin(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    Some(format!("{}://{}/", parsed.scheme(), parsed.host_str()?))
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_listing(&self, url: &str) -> Result<String> {
        self.get_with_retries(url).await
    }

    async fn fetch_detail(&self, url: &str) -> Result<String> {
        self.get_with_retries(url).await
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}
