use super::image::extract_main_image;
use super::price::{extract_list_price, extract_payments_from};
use super::tagline::extract_tagline;
use super::text::{clean_text, strip_used_prefix};
use scraper::{Html, Selector};
use std::sync::LazyLock;
use tracing::debug;

static HEADING: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1, h2").unwrap());
static TITLE_FALLBACK: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".product-title, .vehicle-title, [itemprop='name']").unwrap()
});

static PAGE_TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static CHALLENGE_ELEMENT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[id^='cf-challenge'], #challenge-form").unwrap());

/// Wording of anti-bot interstitials served instead of the real content
const CHALLENGE_MARKERS: [&str; 5] = [
    "just a moment",
    "attention required",
    "access denied",
    "verify you are human",
    "checking your browser",
];

/// Interstitials carry a line or two of visible text; dealer pages run to
/// thousands of characters
const SHORT_PAGE_CHARS: usize = 1500;

/// Fields read from a single unit's detail page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailFields {
    pub title: String,
    pub tagline: String,
    pub list_price: String,
    pub payments_from: String,
    pub image_url: String,
}

/// Extract the unit fields from a detail page.
pub fn parse_detail_html(detail_url: &str, html: &str) -> DetailFields {
    let doc = Html::parse_document(html);

    let raw_title = doc
        .select(&HEADING)
        .next()
        .or_else(|| doc.select(&TITLE_FALLBACK).next())
        .map(|el| clean_text(&el.text().collect::<String>()))
        .unwrap_or_default();

    let fields = DetailFields {
        title: strip_used_prefix(&raw_title),
        tagline: extract_tagline(&doc, &raw_title),
        list_price: extract_list_price(&doc),
        payments_from: extract_payments_from(&doc),
        image_url: extract_main_image(&doc, detail_url),
    };
    debug!(
        "Parsed {}: title='{}' price='{}' payment='{}'",
        detail_url, fields.title, fields.list_price, fields.payments_from
    );
    fields
}

/// True when plain `text` (a title or a short body) reads like an interstitial.
pub fn is_challenge_text(text: &str) -> bool {
    let low = text.to_lowercase();
    CHALLENGE_MARKERS.iter().any(|m| low.contains(m))
}

/// True when `html` is an anti-bot interstitial rather than a dealer page.
///
/// Only the `<title>`, a challenge element id and the visible text of short
/// pages are checked. Scripts and form widgets (reCAPTCHA, Cloudflare's
/// injected `challenge-platform` script) are ignored, as ordinary pages
/// carry them too.
pub fn is_bot_challenge(html: &str) -> bool {
    let doc = Html::parse_document(html);

    let title_hit = doc
        .select(&PAGE_TITLE)
        .next()
        .is_some_and(|t| is_challenge_text(&t.text().collect::<String>()));
    if title_hit || doc.select(&CHALLENGE_ELEMENT).next().is_some() {
        return true;
    }

    let body = visible_text(&doc);
    body.len() < SHORT_PAGE_CHARS && is_challenge_text(&body)
}

fn visible_text(doc: &Html) -> String {
    let parts: Vec<&str> = doc
        .tree
        .root()
        .descendants()
        .filter(|node| {
            !node
                .parent()
                .and_then(|p| p.value().as_element())
                .is_some_and(|el| matches!(el.name(), "script" | "style" | "noscript" | "title"))
        })
        .filter_map(|node| node.value().as_text())
        .map(|text| text.trim())
        .filter(|text| !text.is_empty())
        .collect();
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAIL: &str = r#"<!doctype html><html><head>
        <title>Used 2019 Jayco Eagle HT 28.5RSTS | Parris RV</title>
        <meta property="og:image" content="https://cdn.parrisrv.com/units/4411/main.jpg">
        </head><body>
        <div class="unit-header">
          <h1>Used 2019 Jayco Eagle HT 28.5RSTS</h1>
          <div class="subtitle">Rear Living Fifth Wheel!</div>
          <div>Stock # 4411</div>
        </div>
        <div class="pricing">
          <div class="row"><span>List Price:</span> <span class="list">$39,995</span></div>
          <div class="row payments"><span>Payments From:</span> <span>$289 /mo.</span></div>
        </div>
        <div class="payments-disclaimer-container">$289/mo based on 20% down, 180 months</div>
        </body></html>"#;

    #[test]
    fn parses_full_detail_page() {
        let fields = parse_detail_html("https://www.parrisrv.com/product/used-2019-jayco-4411", DETAIL);
        assert_eq!(
            fields,
            DetailFields {
                title: "2019 Jayco Eagle HT 28.5RSTS".into(),
                tagline: "Rear Living Fifth Wheel!".into(),
                list_price: "$39,995".into(),
                payments_from: "$289".into(),
                image_url: "https://cdn.parrisrv.com/units/4411/main.jpg".into(),
            }
        );
    }

    #[test]
    fn title_from_class_when_no_heading() {
        let html = r#"<div class="vehicle-title">USED: 2016 Thor Ace</div>"#;
        let fields = parse_detail_html("https://x.com/product/used-thor", html);
        assert_eq!(fields.title, "2016 Thor Ace");
        assert_eq!(fields.list_price, "");
    }

    #[test]
    fn empty_html_gives_empty_fields() {
        assert_eq!(parse_detail_html("https://x.com/p", ""), DetailFields::default());
    }

    const CONTACT_WIDGETS: &str = r#"
        <form class="contact"><div class="g-recaptcha" data-sitekey="abc"></div></form>
        <script src="https://www.google.com/recaptcha/api.js" async defer></script>
        <script src="/cdn-cgi/challenge-platform/scripts/jsd/main.js"></script>"#;

    #[test]
    fn challenge_pages_detected() {
        assert!(is_bot_challenge("<title>Just a moment...</title><div>Checking</div>"));
        assert!(is_bot_challenge("<html><body><div id=cf-challenge-running></div></body></html>"));
        assert!(is_bot_challenge("<h1>Access Denied</h1><p>Reference #18.2f</p>"));
        assert!(is_bot_challenge(
            "<body><h2>Verify you are human by completing the action below.</h2></body>"
        ));
        assert!(!is_bot_challenge(DETAIL));
    }

    #[test]
    fn recaptcha_and_cloudflare_script_are_not_challenges() {
        let detail = DETAIL.replace("</body>", &format!("{CONTACT_WIDGETS}</body>"));
        assert!(!is_bot_challenge(&detail));
        assert_eq!(
            parse_detail_html("https://www.parrisrv.com/product/used-2019-jayco-4411", &detail)
                .list_price,
            "$39,995"
        );

        let listing = format!(
            r#"<html><head><title>Used RVs For Sale | Parris RV</title></head><body><main>
               <div class="card"><a href="/product/used-2018-alpha-1">View Details</a></div>
               {CONTACT_WIDGETS}</main></body></html>"#
        );
        assert!(!is_bot_challenge(&listing));
    }

    #[test]
    fn long_pages_may_mention_markers() {
        let filler = "Spacious rear living with theater seating. ".repeat(60);
        let html = format!("<body><h1>2020 Grand Design</h1><p>{filler}</p><p>Access denied to pets? Never.</p></body>");
        assert!(!is_bot_challenge(&html));
    }

    #[test]
    fn challenge_text_matches_titles() {
        assert!(is_challenge_text("Just a moment..."));
        assert!(is_challenge_text("Attention Required! | Cloudflare"));
        assert!(!is_challenge_text("2019 Jayco Eagle HT"));
    }
}
