//! List price and monthly payment extraction.
//!
//! Prices are found label-first: locate a text node matching a label such as
//! "List Price", climb to the enclosing box and take the amount that follows
//! the label. Container selectors are the fallback.

use super::text::{clean_text, first_money, largest_amount, MONEY};
use regex::{Regex, RegexBuilder};
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::debug;

/// Boxes carrying these class fragments hold fine print, not the headline figure
const BOX_BLOCKLIST: [&str; 6] = ["disclaimer", "fine", "footnote", "legal", "terms", "finance"];

const MAX_CLIMB_HOPS: usize = 5;

static MONTHLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\$\s*[\d,]+(?:\.\d{2})?)\s*/\s*mo").unwrap());

static PER_MONTH_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)/\s*mo").unwrap());

static LIST_PRICE_LABELS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    labels(&[
        r"\bList\s*Price\b",
        r"\bMSRP\b",
        r"\bSale\s*Price\b",
        r"\bPrice\b",
        r"Our\s*Price",
    ])
});

static PAYMENT_LABELS: LazyLock<Vec<Regex>> =
    LazyLock::new(|| labels(&[r"\bPayments?\s*From\b", r"\bFrom:", r"As\s+low\s+as"]));

static PRICE_CONTAINERS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        ".price, .our-price, .sale-price, .msrp, [class*='price'], [id*='price'], [data-price]",
    )
    .unwrap()
});

static PAYMENT_CONTAINERS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("[class*='payment'], [id*='payment'], .details, .finance, .cta, .summary")
        .unwrap()
});

fn labels(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| RegexBuilder::new(p).case_insensitive(true).build().unwrap())
        .collect()
}

/// Headline price of the unit, e.g. "$39,995".
pub fn extract_list_price(doc: &Html) -> String {
    if let Some(amount) = amount_near_label(doc, &LIST_PRICE_LABELS, false) {
        return amount;
    }

    let candidates: Vec<String> = doc
        .select(&PRICE_CONTAINERS)
        .filter_map(|el| first_money(&clean_text(&el.text().collect::<String>())))
        .collect();
    debug!("Price containers yielded {} candidates", candidates.len());
    largest_amount(candidates).unwrap_or_default()
}

/// Monthly payment figure without the "/mo" suffix, e.g. "$205".
pub fn extract_payments_from(doc: &Html) -> String {
    if let Some(amount) = amount_near_label(doc, &PAYMENT_LABELS, true) {
        return amount;
    }

    doc.select(&PAYMENT_CONTAINERS)
        .find_map(|el| {
            let text = clean_text(&el.text().collect::<String>());
            MONTHLY
                .captures(&text)
                .map(|c| c[1].replace(' ', ""))
        })
        .unwrap_or_default()
}

/// Find an amount close to one of `labels`.
///
/// Labels are tried in order. For each text node matching a label, the
/// nearest `div`/`section`/`article` ancestor (at most five hops up) is the
/// search box; fine-print boxes are skipped. Within the box the first amount
/// after the label wins, otherwise the largest amount in the box. With
/// `per_month` set, only amounts followed by "/mo" qualify.
pub fn amount_near_label(doc: &Html, labels: &[Regex], per_month: bool) -> Option<String> {
    for label in labels {
        for node in doc.tree.root().descendants() {
            let Some(text) = node.value().as_text() else {
                continue;
            };
            if !label.is_match(text) {
                continue;
            }
            let Some(container) = node
                .parent()
                .and_then(ElementRef::wrap)
                .and_then(climb_to_box)
            else {
                continue;
            };
            if is_fine_print(&container) {
                continue;
            }

            let box_text = container
                .text()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" ");

            if let Some(amount) = amount_after_label(&box_text, label, per_month) {
                return Some(amount);
            }
            if let Some(amount) = largest_in_box(&box_text, per_month) {
                return Some(amount);
            }
        }
    }
    None
}

fn climb_to_box(start: ElementRef<'_>) -> Option<ElementRef<'_>> {
    let mut el = start;
    let mut hops = 0;
    while !matches!(el.value().name(), "div" | "section" | "article") && hops < MAX_CLIMB_HOPS {
        el = el.parent().and_then(ElementRef::wrap)?;
        hops += 1;
    }
    Some(el)
}

fn is_fine_print(el: &ElementRef<'_>) -> bool {
    let classes = el.value().classes().collect::<Vec<_>>().join(" ").to_lowercase();
    BOX_BLOCKLIST.iter().any(|b| classes.contains(b))
}

fn amount_after_label(box_text: &str, label: &Regex, per_month: bool) -> Option<String> {
    let text = clean_text(box_text);
    let found = label.find(&text)?;
    let rest = &text[found.end()..];
    if per_month {
        MONTHLY.captures(rest).map(|c| c[1].replace(' ', ""))
    } else {
        first_money(rest)
    }
}

fn largest_in_box(box_text: &str, per_month: bool) -> Option<String> {
    let candidates: Vec<String> = MONEY
        .find_iter(box_text)
        .filter(|m| {
            if !per_month {
                return true;
            }
            let after: String = box_text[m.end()..].chars().take(20).collect();
            PER_MONTH_SUFFIX.is_match(&after)
        })
        .map(|m| m.as_str().replace(' ', ""))
        .collect();
    largest_amount(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_price_follows_its_label() {
        let doc = Html::parse_document(
            r#"<div class="pricing"><span>MSRP</span> <s>$52,000</s>
               <span>List Price:</span> <strong>$39,995</strong></div>"#,
        );
        assert_eq!(extract_list_price(&doc), "$39,995");
    }

    #[test]
    fn msrp_used_when_no_list_price_label() {
        let doc = Html::parse_document(
            r#"<section><p>MSRP <b>$ 48,100</b></p><p>Stock # 12345</p></section>"#,
        );
        assert_eq!(extract_list_price(&doc), "$48,100");
    }

    #[test]
    fn fine_print_boxes_are_skipped() {
        let doc = Html::parse_document(
            r#"<div class="legal-disclaimer">Price excludes $499 doc fee</div>
               <div class="unit"><span>Sale Price</span> $27,450</div>"#,
        );
        assert_eq!(extract_list_price(&doc), "$27,450");
    }

    #[test]
    fn falls_back_to_largest_price_container() {
        let doc = Html::parse_document(
            r#"<span class="fee-price">$250</span><span class="our-price">$18,900</span>"#,
        );
        assert_eq!(extract_list_price(&doc), "$18,900");
    }

    #[test]
    fn no_price_anywhere() {
        let doc = Html::parse_document("<div><h1>Call for availability</h1></div>");
        assert_eq!(extract_list_price(&doc), "");
    }

    #[test]
    fn climb_stops_after_five_inline_hops() {
        // label six spans deep: the box is the outermost span, not the div
        let doc = Html::parse_document(
            r#"<div class="unit"><span>$12,345 <span><span><span><span><span>List Price</span></span></span></span></span></span> $99,999</div>"#,
        );
        assert_eq!(extract_list_price(&doc), "$12,345");
    }

    #[test]
    fn label_without_a_box_is_skipped() {
        // <p> climbs through body and html without meeting a box
        let doc = Html::parse_document(
            r#"<p>Price $1</p><div class="unit"><span>Our Price</span> $22,000</div>"#,
        );
        assert_eq!(extract_list_price(&doc), "$22,000");
    }

    #[test]
    fn payment_requires_per_month_suffix() {
        let doc = Html::parse_document(
            r#"<div class="card"><span>Payments From:</span>
               <span>$39,995</span> <span>$205 /mo</span></div>"#,
        );
        assert_eq!(extract_payments_from(&doc), "$205");
    }

    #[test]
    fn payment_from_container_fallback() {
        let doc = Html::parse_document(
            r#"<div class="monthly-payment-box">Est. $ 312.50/mo.</div>"#,
        );
        assert_eq!(extract_payments_from(&doc), "$312.50");
    }

    #[test]
    fn payment_largest_monthly_in_box_when_not_after_label() {
        let doc = Html::parse_document(
            r#"<article>$189/mo or $215/mo <em>as low as</em></article>"#,
        );
        assert_eq!(extract_payments_from(&doc), "$215");
    }
}
