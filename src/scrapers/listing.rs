//! Listing-page handling: pagination URLs, detail-link discovery and the
//! per-card payment disclaimers.

use super::text::{clean_text, strip_fragment};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;
use url::Url;

static PAGE_PARAM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([?&])page=\d+").unwrap());

/// Category pages such as `/product/travel-trailers/used`
static CATEGORY_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/product/[^/]+/used/?$").unwrap());

static USED_DETAIL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)/product/used-").unwrap());

static VIEW_DETAILS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)view\s+details").unwrap());

static PRODUCT_LINKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href*='/product/']").unwrap());

static USED_PRODUCT_LINKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href*='/product/used-']").unwrap());

static CTA: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href], button[href]").unwrap());

static DISCLAIMER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".payments-disclaimer-container").unwrap());

const MAX_DISCLAIMER_CLIMB: usize = 8;
const MAX_DEPTH: usize = 40;

/// Host of `listing_url` without a leading `www.`; detail links must live on it.
pub fn site_domain_of(listing_url: &str) -> String {
    Url::parse(listing_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_default()
}

/// URL of results page `page` (1-based) for `listing_url`.
pub fn page_url(listing_url: &str, page: usize) -> String {
    if listing_url.contains("page=") {
        return PAGE_PARAM
            .replace(listing_url, format!("${{1}}page={page}"))
            .into_owned();
    }
    if page <= 1 {
        listing_url.to_string()
    } else if listing_url.contains('?') {
        format!("{listing_url}&page={page}")
    } else {
        format!("{listing_url}?page={page}")
    }
}

/// Keep only unit detail pages on `site_domain`, normalised and deduplicated.
/// An empty `site_domain` keeps nothing.
pub fn filter_detail_urls<I, S>(urls: I, site_domain: &str) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if site_domain.is_empty() {
        return BTreeSet::new();
    }
    urls.into_iter()
        .map(|u| strip_fragment(u.as_ref()))
        .filter(|u| !u.contains(" \"") && !u.contains('\''))
        .filter(|u| {
            let Ok(parsed) = Url::parse(u) else {
                return false;
            };
            let host_ok = parsed.host_str().is_some_and(|h| h.contains(site_domain));
            let path = parsed.path();
            host_ok && path.contains("/product/") && !CATEGORY_PATH.is_match(path)
        })
        .collect()
}

fn resolve(base: &Url, href: &str) -> Option<String> {
    base.join(href.trim()).ok().map(|u| u.to_string())
}

/// What one rendered listing page yields
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub detail_urls: BTreeSet<String>,
    /// Normalised detail URL -> disclaimer text (possibly empty)
    pub disclaimers: HashMap<String, String>,
}

/// Pull detail links and card disclaimers out of a listing page's HTML.
pub fn extract_listing_page(html: &str, page_url: &str, site_domain: &str) -> ListingPage {
    let doc = Html::parse_document(html);
    let Ok(base) = Url::parse(page_url) else {
        return ListingPage::default();
    };

    let anchors = doc
        .select(&PRODUCT_LINKS)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| resolve(&base, href));
    let ctas = doc
        .select(&CTA)
        .filter(|el| VIEW_DETAILS.is_match(&el.text().collect::<String>()))
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| resolve(&base, href));
    let detail_urls = filter_detail_urls(anchors.chain(ctas), site_domain);

    ListingPage {
        detail_urls,
        disclaimers: card_disclaimers(&doc, &base),
    }
}

fn card_disclaimers(doc: &Html, base: &Url) -> HashMap<String, String> {
    let all: Vec<ElementRef<'_>> = doc.select(&DISCLAIMER).collect();
    let shallowest = all
        .iter()
        .filter_map(|d| {
            let text = disclaimer_text(d);
            (!text.is_empty()).then(|| (d.ancestors().take(MAX_DEPTH).count(), text))
        })
        .min_by_key(|(depth, _)| *depth)
        .map(|(_, text)| text)
        .unwrap_or_default();

    let mut out = HashMap::new();
    for anchor in doc.select(&USED_PRODUCT_LINKS) {
        let Some(url) = anchor
            .value()
            .attr("href")
            .and_then(|href| resolve(base, href))
            .map(|u| strip_fragment(&u))
        else {
            continue;
        };
        if url.is_empty() || !USED_DETAIL.is_match(&url) || out.contains_key(&url) {
            continue;
        }
        let text = disclaimer_near(anchor).unwrap_or_else(|| shallowest.clone());
        out.insert(url, text);
    }
    out
}

/// Disclaimer inside the closest ancestor (at most eight levels up) that has one.
fn disclaimer_near(anchor: ElementRef<'_>) -> Option<String> {
    let mut current = Some(anchor);
    for _ in 0..MAX_DISCLAIMER_CLIMB {
        let el = current?;
        let found = el
            .select(&DISCLAIMER)
            .map(|d| disclaimer_text(&d))
            .find(|t| !t.is_empty());
        if found.is_some() {
            return found;
        }
        current = el.parent().and_then(ElementRef::wrap);
    }
    None
}

fn disclaimer_text(el: &ElementRef<'_>) -> String {
    clean_text(&el.text().collect::<String>())
}

/// Detail URLs and disclaimers accumulated across listing pages
#[derive(Debug, Clone, Default)]
pub struct ListingIndex {
    pub detail_urls: BTreeSet<String>,
    pub disclaimers: HashMap<String, String>,
}

impl ListingIndex {
    /// Fold a page in, returning how many detail URLs were new.
    pub fn merge(&mut self, page: ListingPage) -> usize {
        let before = self.detail_urls.len();
        self.detail_urls.extend(page.detail_urls);
        self.disclaimers.extend(page.disclaimers);
        self.detail_urls.len() - before
    }

    pub fn disclaimer_for(&self, detail_url: &str) -> &str {
        self.disclaimers
            .get(&strip_fragment(detail_url))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn disclaimers_found(&self) -> usize {
        self.disclaimers.values().filter(|d| !d.is_empty()).count()
    }
}

/// Tracks the product-link count between scroll rounds; lazy loading is
/// finished once the count holds for `min_cycles` rounds in a row.
#[derive(Debug)]
pub struct StabilityTracker {
    min_cycles: usize,
    last: Option<usize>,
    stable: usize,
}

impl StabilityTracker {
    pub fn new(min_cycles: usize) -> Self {
        Self {
            min_cycles,
            last: None,
            stable: 0,
        }
    }

    pub fn observe(&mut self, count: usize) -> bool {
        if self.last == Some(count) {
            self.stable += 1;
        } else {
            self.stable = 0;
        }
        self.last = Some(count);
        self.stable >= self.min_cycles
    }
}
