//! Main unit photo lookup.
//!
//! Dealer pages bury the hero image in many places (social meta tags,
//! `<picture>` sources, lazy-load attributes, inline JSON), so the sources
//! are tried from most to least reliable and the first real photo wins.

use super::text::is_floorplan_or_virtual;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use url::Url;

const BLACKLIST_KEYWORDS: [&str; 23] = [
    "logo",
    "header",
    "footer",
    "icon",
    "sprite",
    "map",
    "anniversary",
    "facebook",
    "twitter",
    "youtube",
    "instagram",
    "pinterest",
    "badge",
    "award",
    "favicon",
    "placeholder",
    "dummy",
    "pixel",
    "mfg_logo",
    "manufacturer",
    "certified",
    "seal",
    "floorplan",
];

const LAZY_ATTRS: [&str; 4] = ["data-bg", "data-background", "data-image", "data-src"];

static REAL_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(jpe?g|png|webp)(\?.*)?$").unwrap());

static SRCSET_ENTRY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\S+)\s+(\d+)w").unwrap());

static CSS_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)url\(\s*['"]?([^)'"]+)['"]?\s*\)"#).unwrap());

static INLINE_IMAGE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://[^\s"'<>]+?\.(?:jpe?g|png|webp)(?:\?[^\s"'<>]*)?"#).unwrap()
});

static META: LazyLock<Selector> = LazyLock::new(|| Selector::parse("meta").unwrap());
static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("link[rel]").unwrap());
static SOURCE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("source[srcset]").unwrap());
static NOSCRIPT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("noscript").unwrap());
static IMG: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());
static ANY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("*").unwrap());

pub fn is_real_image(url: &str) -> bool {
    REAL_IMAGE.is_match(url)
}

pub fn is_blacklisted(url_or_alt: &str) -> bool {
    let low = url_or_alt.to_lowercase();
    BLACKLIST_KEYWORDS.iter().any(|k| low.contains(k))
}

/// Widest entry of a `srcset`; entries without a width descriptor rank last.
pub fn pick_from_srcset(srcset: &str) -> Option<String> {
    srcset
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| match SRCSET_ENTRY.captures(part) {
            Some(caps) => Some((caps[2].parse::<u32>().unwrap_or(0), caps[1].to_string())),
            None => part.split_whitespace().next().map(|u| (0, u.to_string())),
        })
        .enumerate()
        // stable pick: first entry among equal widths
        .max_by(|(ia, (wa, _)), (ib, (wb, _))| wa.cmp(wb).then(ib.cmp(ia)))
        .map(|(_, (_, url))| url)
}

/// `data-src`, then `src`, then the widest `srcset` entry.
pub fn pick_img_url(img: &ElementRef<'_>) -> Option<String> {
    let attrs = img.value();
    attrs
        .attr("data-src")
        .filter(|v| !v.is_empty())
        .or_else(|| attrs.attr("src").filter(|v| !v.is_empty()))
        .map(|v| v.trim().to_string())
        .or_else(|| pick_from_srcset(attrs.attr("srcset").unwrap_or("")))
        .filter(|v| !v.is_empty())
}

fn resolve(base: &str, href: &str) -> String {
    match Url::parse(base).and_then(|b| b.join(href)) {
        Ok(url) => url.to_string(),
        Err(_) => href.to_string(),
    }
}

fn accept(base: &str, candidate: &str) -> Option<String> {
    let url = resolve(base, candidate.trim());
    (is_real_image(&url) && !is_blacklisted(&url)).then_some(url)
}

/// Best guess at the unit's main photo as an absolute URL, or an empty string.
pub fn extract_main_image(doc: &Html, base_url: &str) -> String {
    from_meta(doc, base_url)
        .or_else(|| from_picture_sources(doc, base_url))
        .or_else(|| from_noscript(doc, base_url))
        .or_else(|| from_lazy_attributes(doc, base_url))
        .or_else(|| from_img_tags(doc, base_url))
        .or_else(|| from_inline_urls(doc))
        .unwrap_or_default()
}

fn from_meta(doc: &Html, base: &str) -> Option<String> {
    let meta_keys = [
        ("property", "og:image"),
        ("property", "og:image:url"),
        ("name", "twitter:image"),
    ];
    for (attr, key) in meta_keys {
        let hit = doc
            .select(&META)
            .filter(|m| {
                m.value()
                    .attr(attr)
                    .is_some_and(|v| v.to_lowercase().contains(key))
            })
            .filter_map(|m| m.value().attr("content"))
            .filter(|c| !c.is_empty())
            .find_map(|c| accept(base, c));
        if hit.is_some() {
            return hit;
        }
    }

    doc.select(&LINK)
        .filter(|l| {
            l.value()
                .attr("rel")
                .is_some_and(|r| r.to_lowercase().contains("image_src"))
        })
        .filter_map(|l| l.value().attr("href"))
        .filter(|h| !h.is_empty())
        .find_map(|h| accept(base, h))
}

fn from_picture_sources(doc: &Html, base: &str) -> Option<String> {
    doc.select(&SOURCE)
        .filter_map(|s| pick_from_srcset(s.value().attr("srcset").unwrap_or("")))
        .find_map(|best| accept(base, &best))
}

fn from_noscript(doc: &Html, base: &str) -> Option<String> {
    doc.select(&NOSCRIPT).find_map(|nos| {
        // noscript content arrives as raw text when parsed with scripting on
        let inner = Html::parse_fragment(&nos.text().collect::<String>());
        let from_text = inner
            .select(&IMG)
            .next()
            .and_then(|img| pick_img_url(&img))
            .and_then(|c| accept(base, &c));
        from_text.or_else(|| {
            nos.select(&IMG)
                .next()
                .and_then(|img| pick_img_url(&img))
                .and_then(|c| accept(base, &c))
        })
    })
}

fn from_lazy_attributes(doc: &Html, base: &str) -> Option<String> {
    doc.select(&ANY).find_map(|el| {
        let attrs = el.value();
        let from_style = attrs.attr("style").and_then(|style| {
            CSS_URL
                .captures_iter(style)
                .find_map(|caps| accept(base, &caps[1]))
        });
        from_style.or_else(|| {
            LAZY_ATTRS
                .iter()
                .filter_map(|a| attrs.attr(a))
                .filter(|v| !v.is_empty())
                .find_map(|v| accept(base, v))
        })
    })
}

fn from_img_tags(doc: &Html, base: &str) -> Option<String> {
    doc.select(&IMG).find_map(|img| {
        let candidate = pick_img_url(&img)?;
        let attrs = img.value();
        let alt = attrs.attr("alt").unwrap_or("");
        let src = attrs.attr("src").unwrap_or("");
        let srcset = attrs.attr("srcset").unwrap_or("");
        let url = resolve(base, &candidate);
        if !is_real_image(&url) || is_blacklisted(&url) || is_blacklisted(alt) {
            return None;
        }
        if is_floorplan_or_virtual(&[alt, src, srcset, url.as_str()]) {
            return None;
        }
        Some(url)
    })
}

fn from_inline_urls(doc: &Html) -> Option<String> {
    let raw = doc.html();
    INLINE_IMAGE_URL
        .find_iter(&raw)
        .map(|m| m.as_str())
        .find(|url| !is_blacklisted(url))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.parrisrv.com/product/used-2019-jayco-1";

    fn image(html: &str) -> String {
        extract_main_image(&Html::parse_document(html), BASE)
    }

    #[test]
    fn srcset_prefers_widest() {
        assert_eq!(
            pick_from_srcset("a-300.jpg 300w, a-1200.jpg 1200w, a-800.jpg 800w").as_deref(),
            Some("a-1200.jpg")
        );
        assert_eq!(pick_from_srcset("only.jpg").as_deref(), Some("only.jpg"));
        assert_eq!(pick_from_srcset(""), None);
    }

    #[test]
    fn og_image_wins_and_is_resolved() {
        let html = r#"<html><head>
            <meta property="og:image" content="/uploads/units/front.jpg">
            </head><body><img src="/other.jpg"></body></html>"#;
        assert_eq!(image(html), "https://www.parrisrv.com/uploads/units/front.jpg");
    }

    #[test]
    fn blacklisted_meta_image_is_skipped() {
        let html = r#"<html><head>
            <meta property="og:image" content="https://cdn.x.com/site-logo.png">
            </head><body><picture><source srcset="/u/a-640.webp 640w, /u/a-1600.webp 1600w"></picture></body></html>"#;
        assert_eq!(image(html), "https://www.parrisrv.com/u/a-1600.webp");
    }

    #[test]
    fn background_image_style() {
        let html = r#"<div class="hero" style="background-image: url('https://img.x.com/unit/side.JPG?w=900')"></div>"#;
        assert_eq!(image(html), "https://img.x.com/unit/side.JPG?w=900");
    }

    #[test]
    fn img_tags_skip_floorplans_and_logos() {
        let html = r#"<body>
            <img src="/img/dealer-logo.png" alt="Parris RV">
            <img src="/img/unit-fp.jpg" alt="Floor Plan">
            <img data-src="/img/unit-exterior.jpg" src="/img/lazy.gif" alt="Exterior">
        </body>"#;
        // data-src carries the lazy-load image; the generic lazy-attribute pass finds it first
        assert_eq!(image(html), "https://www.parrisrv.com/img/unit-exterior.jpg");
    }

    #[test]
    fn plain_img_after_filters() {
        let html = r#"<body>
            <img src="/img/award-badge.png">
            <img src="/img/tour-360.jpg" alt="Virtual Tour">
            <img src="/img/rear.jpeg" alt="Rear">
        </body>"#;
        assert_eq!(image(html), "https://www.parrisrv.com/img/rear.jpeg");
    }

    #[test]
    fn inline_script_url_as_last_resort() {
        let html = r#"<body><script>var gallery = {"main":"https://cdn.dealer.com/photos/9981_1.jpg"};</script></body>"#;
        assert_eq!(image(html), "https://cdn.dealer.com/photos/9981_1.jpg");
    }

    #[test]
    fn nothing_found() {
        assert_eq!(image("<body><p>No photos yet</p></body>"), "");
    }
}
