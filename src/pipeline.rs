//! Crawl listing pages, fetch every unit's detail page and assemble rows.

use crate::models::{Listing, ScrapeRun};
use crate::scrapers::detail::{is_bot_challenge, is_challenge_text, parse_detail_html};
use crate::scrapers::listing::{extract_listing_page, page_url, ListingIndex};
use crate::scrapers::traits::PageFetcher;
use crate::scrapers::types::ScrapeParams;
use chrono::Utc;
use tracing::{debug, info, warn};

const PROGRESS_EVERY: usize = 10;

/// Visit listing pages until one adds no new units or `max_pages` is hit.
pub async fn crawl_listing(fetcher: &dyn PageFetcher, params: &ScrapeParams) -> ListingIndex {
    let mut index = ListingIndex::default();

    for page in 1..=params.max_pages {
        let url = page_url(&params.listing_url, page);
        if page > 1 {
            tokio::time::sleep(params.request_delay).await;
        }

        let html = match fetcher.fetch_listing(&url).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Listing page {} failed via {}: {:#}", page, fetcher.source_name(), e);
                break;
            }
        };
        if is_bot_challenge(&html) {
            warn!("Listing page {} is a bot challenge, stopping", page);
            break;
        }

        let found = extract_listing_page(&html, &url, &params.site_domain);
        let on_page = found.detail_urls.len();
        let added = index.merge(found);
        info!(
            "Page {}: {} detail links ({} new, {} total)",
            page,
            on_page,
            added,
            index.detail_urls.len()
        );

        if page > 1 && added == 0 {
            debug!("No new units on page {}, pagination exhausted", page);
            break;
        }
    }

    index
}

/// Merge a detail page's fields with the card disclaimer into one row.
/// Empty `html` yields a row titled from the URL slug.
pub fn assemble_row(detail_url: &str, html: &str, index: &ListingIndex) -> Listing {
    let disclaimer = index.disclaimer_for(detail_url);
    if html.trim().is_empty() {
        return Listing::fallback(detail_url, disclaimer);
    }

    let fields = parse_detail_html(detail_url, html);
    if fields.title.is_empty() {
        debug!("No title on {}, using slug", detail_url);
        return Listing {
            tagline: fields.tagline,
            list_price: fields.list_price,
            payments_from: fields.payments_from,
            image_url: fields.image_url,
            ..Listing::fallback(detail_url, disclaimer)
        };
    }

    Listing {
        title: fields.title,
        tagline: fields.tagline,
        list_price: fields.list_price,
        payments_from: fields.payments_from,
        payments_disclaimer: disclaimer.to_string(),
        image_url: fields.image_url,
        detail_url: detail_url.to_string(),
    }
}

/// Rows with no title, or titled like an anti-bot interstitial
pub fn is_junk_row(row: &Listing) -> bool {
    let title = row.title.trim();
    title.is_empty() || is_challenge_text(title)
}

fn usable(html: &str) -> bool {
    !html.trim().is_empty() && !is_bot_challenge(html)
}

async fn fetch_detail_html(
    url: &str,
    primary: &dyn PageFetcher,
    fallback: Option<&dyn PageFetcher>,
) -> String {
    let html = primary.fetch_detail(url).await.unwrap_or_else(|e| {
        warn!("Detail page {} failed via {}: {:#}", url, primary.source_name(), e);
        String::new()
    });
    if usable(&html) {
        return html;
    }

    let Some(fallback) = fallback else {
        return String::new();
    };
    debug!("Retrying {} via {}", url, fallback.source_name());
    match fallback.fetch_detail(url).await {
        Ok(html) if usable(&html) => html,
        Ok(_) => {
            warn!("Detail page {} still blocked via {}", url, fallback.source_name());
            String::new()
        }
        Err(e) => {
            warn!("Detail page {} failed via {}: {:#}", url, fallback.source_name(), e);
            String::new()
        }
    }
}

/// Run a full scrape: listing crawl, detail fetches, row assembly.
pub async fn run_scrape(
    primary: &dyn PageFetcher,
    fallback: Option<&dyn PageFetcher>,
    params: &ScrapeParams,
) -> ScrapeRun {
    let index = crawl_listing(primary, params).await;
    let total = index.detail_urls.len();
    info!("Found {} detail URLs across pages", total);
    info!(
        "Captured {} payment disclaimers from listing cards",
        index.disclaimers_found()
    );

    let mut rows = Vec::with_capacity(total);
    for (i, url) in index.detail_urls.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(params.request_delay).await;
        }
        let html = fetch_detail_html(url, primary, fallback).await;
        let row = assemble_row(url, &html, &index);

        if is_junk_row(&row) {
            warn!("Dropping junk row for {}", url);
        } else {
            rows.push(row);
        }

        if (i + 1) % PROGRESS_EVERY == 0 {
            info!("Processed {}/{}", i + 1, total);
        }
    }

    ScrapeRun {
        listing_url: params.listing_url.clone(),
        scraped_at: Utc::now(),
        detail_urls_found: total,
        disclaimers_found: index.disclaimers_found(),
        rows,
    }
}
