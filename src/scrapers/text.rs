//! Small text helpers shared by the field extractors.

use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static USED_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*used\s*[:\-]?\s*").unwrap());

static ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|amp|quot|apos|lt|gt);").unwrap());

/// A dollar amount such as `$1,234` or `$ 99.50`
pub static MONEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\s*[\d,]+(?:\.\d{2})?").unwrap());

/// Collapse all whitespace (NBSP included) into single spaces and trim.
pub fn clean_text(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Decode the character references that show up in scraped hrefs. Unknown or
/// invalid references are left as they are.
pub fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            let decoded = match name {
                "amp" => Some('&'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "lt" => Some('<'),
                "gt" => Some('>'),
                _ => {
                    let code = match name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => name[1..].parse().ok(),
                    };
                    code.and_then(char::from_u32)
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

/// Drop the `#fragment`, trailing punctuation and one trailing slash, so
/// that the same unit always maps to the same key.
pub fn strip_fragment(url: &str) -> String {
    if url.is_empty() {
        return String::new();
    }
    let unescaped = decode_entities(url);
    let base = unescaped.split('#').next().unwrap_or("");
    let trimmed = base.trim_end_matches([')', '.', ',', ';']);
    trimmed.strip_suffix('/').unwrap_or(trimmed).to_string()
}

/// Remove a leading "Used", "USED:", "used -" and the like.
pub fn strip_used_prefix(title: &str) -> String {
    USED_PREFIX.replace(title, "").into_owned()
}

/// First dollar amount in `text`, spaces removed.
pub fn first_money(text: &str) -> Option<String> {
    MONEY.find(text).map(|m| m.as_str().replace(' ', ""))
}

/// Numeric value of an amount like `$12,995.00`; 0.0 when unparseable.
pub fn money_value(amount: &str) -> f64 {
    amount
        .replace(['$', ','], "")
        .trim()
        .parse()
        .unwrap_or(0.0)
}

/// Pick the largest amount from a list of candidates.
pub fn largest_amount(mut amounts: Vec<String>) -> Option<String> {
    amounts.sort_by(|a, b| money_value(b).total_cmp(&money_value(a)));
    amounts.into_iter().next()
}

pub fn is_floorplan_or_virtual(parts: &[&str]) -> bool {
    let blob = parts.join(" ").to_lowercase();
    ["floorplan", "floor plan", "virtual", "tour", "360"]
        .iter()
        .any(|k| blob.contains(k))
}
