use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scrapers::text::strip_used_prefix;

/// Output column order
pub const COLUMNS: [&str; 7] = [
    "title",
    "tagline",
    "list_price",
    "payments_from",
    "payments_disclaimer",
    "image_url",
    "detail_url",
];

/// One inventory unit, flattened into a table row.
///
/// Every field is best-effort text; a value that could not be found is an
/// empty string rather than a missing column.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    pub title: String,
    pub tagline: String,
    pub list_price: String,
    /// Dollar amount only, e.g. "$205"
    pub payments_from: String,
    pub payments_disclaimer: String,
    pub image_url: String,
    pub detail_url: String,
}

impl Listing {
    /// Row for a unit whose detail page could not be read: the title is
    /// derived from the last URL path segment.
    pub fn fallback(detail_url: &str, disclaimer: &str) -> Self {
        let slug = detail_url.rsplit('/').next().unwrap_or("");
        Self {
            title: strip_used_prefix(&slug.replace('-', " ")),
            payments_disclaimer: disclaimer.to_string(),
            detail_url: detail_url.to_string(),
            ..Self::default()
        }
    }
}

/// Envelope written for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeRun {
    pub listing_url: String,
    pub scraped_at: DateTime<Utc>,
    pub detail_urls_found: usize,
    pub disclaimers_found: usize,
    pub rows: Vec<Listing>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_title_comes_from_slug() {
        let row = Listing::fallback(
            "https://www.parrisrv.com/product/used-2019-jayco-eagle-ht-28-5rsts-12345",
            "Payment based on 20% down",
        );
        assert_eq!(row.title, "2019 jayco eagle ht 28 5rsts 12345");
        assert_eq!(row.payments_disclaimer, "Payment based on 20% down");
        assert!(row.list_price.is_empty());
        assert!(row.detail_url.ends_with("12345"));
    }

    #[test]
    fn columns_match_fields() {
        let row = Listing {
            title: "t".into(),
            ..Listing::default()
        };
        let value = serde_json::to_value(&row).unwrap();
        let keys: Vec<&str> = value
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        let mut expected = COLUMNS.to_vec();
        expected.sort_unstable();
        let mut keys_sorted = keys.clone();
        keys_sorted.sort_unstable();
        assert_eq!(keys_sorted, expected);
    }
}
