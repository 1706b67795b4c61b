//! Marketing tagline shown just under the unit title ("Bunkhouse Ready!").

use super::text::clean_text;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

/// "Sleeps 8!" is a real tagline even though "sleeps" usually marks a spec line
static SLEEPS_TAGLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^sleeps\s+\d+\s*!$").unwrap());

static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1, h2").unwrap());

const SPEC_KEYWORDS: [&str; 19] = [
    "stock #",
    "length",
    "location",
    "sleeps",
    "list price",
    "sale price",
    "from:",
    "payment",
    "msrp",
    "photos",
    "floorplan",
    "tour",
    "description",
    "specifications",
    "contact",
    "call",
    "view",
    "video",
    "monthly",
];

const MAX_SIBLINGS: usize = 8;
const MAX_FALLBACK_LINES: usize = 14;

enum Candidate {
    Accept,
    Skip,
    Keep,
}

/// `monthly` only applies to the full-text fallback.
fn classify(text: &str, include_monthly: bool) -> Candidate {
    if SLEEPS_TAGLINE.is_match(text) {
        return Candidate::Accept;
    }
    let low = text.to_lowercase();
    let keywords = if include_monthly {
        &SPEC_KEYWORDS[..]
    } else {
        &SPEC_KEYWORDS[..SPEC_KEYWORDS.len() - 1]
    };
    if keywords.iter().any(|k| low.contains(k)) {
        return Candidate::Skip;
    }
    if (2..=90).contains(&text.chars().count()) {
        Candidate::Keep
    } else {
        Candidate::Skip
    }
}

fn looks_highlighted(el: &ElementRef<'_>) -> bool {
    let classes = el.value().classes().collect::<Vec<_>>().join(" ").to_lowercase();
    let style = el.value().attr("style").unwrap_or("").to_lowercase();
    ["red", "danger", "subtitle", "subhead"]
        .iter()
        .any(|c| classes.contains(c))
        || ["color:#", "color: rgb(", "color:red"]
            .iter()
            .any(|s| style.contains(s))
}

/// Tagline for the unit, or an empty string.
///
/// Siblings right after the first heading are preferred, highlighted
/// (red/subtitle styled) ones first. Otherwise the lines following
/// `raw_title` in the page text are scanned.
pub fn extract_tagline(doc: &Html, raw_title: &str) -> String {
    if let Some(title) = doc.select(&TITLE).next() {
        let mut highlighted = Vec::new();
        let mut plain = Vec::new();

        for sibling in title.next_siblings().take(MAX_SIBLINGS) {
            if let Some(text) = sibling.value().as_text() {
                let txt = clean_text(text);
                if txt.is_empty() {
                    continue;
                }
                match classify(&txt, false) {
                    Candidate::Accept => return txt,
                    Candidate::Keep => plain.push(txt),
                    Candidate::Skip => {}
                }
                continue;
            }

            let Some(el) = ElementRef::wrap(sibling) else {
                continue;
            };
            if matches!(el.value().name(), "script" | "style") {
                continue;
            }
            let txt = clean_text(&el.text().collect::<String>());
            if txt.is_empty() {
                continue;
            }
            match classify(&txt, false) {
                Candidate::Accept => return txt,
                Candidate::Keep if looks_highlighted(&el) => highlighted.push(txt),
                Candidate::Keep => plain.push(txt),
                Candidate::Skip => {}
            }
        }

        if let Some(first) = highlighted.into_iter().next().or(plain.into_iter().next()) {
            return first;
        }
    }

    fallback_from_text(doc, raw_title)
}

fn fallback_from_text(doc: &Html, raw_title: &str) -> String {
    if raw_title.is_empty() {
        return String::new();
    }
    let full_text = doc
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join("\n")
        .replace('\u{a0}', " ");
    let lines: Vec<&str> = full_text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let Some(start) = lines.iter().position(|l| *l == raw_title) else {
        return String::new();
    };
    for line in lines.iter().skip(start + 1).take(MAX_FALLBACK_LINES) {
        match classify(line, true) {
            Candidate::Accept | Candidate::Keep => return line.to_string(),
            Candidate::Skip => {}
        }
    }
    String::new()
}
