//! Builds the listing-site search URL submitted to a scrape job.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::types::SearchQuery;

const SEARCH_BASE: &str = "https://www.zillow.com/homes/";

/// Characters left unescaped in a URI component: alphanumerics plus
/// `- _ . ! ~ * ' ( )`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, URI_COMPONENT).to_string()
}

/// Converts a search query into a Zillow search URL.
///
/// `"Miami, FL"` / `"Houses"` / `"House for sale"` with a 1..=1,000,000 price
/// range becomes
/// `https://www.zillow.com/homes/for_sale/Miami%2C%20FL_rb/?home_type=house&price_min=1&price_max=1000000`.
#[must_use]
pub fn build_search_url(query: &SearchQuery) -> String {
    let mut url = SEARCH_BASE.to_string();

    let category = query.listing_category.trim();
    if !category.is_empty() {
        if category.to_lowercase().contains("rent") {
            url.push_str("for_rent/");
        } else {
            url.push_str("for_sale/");
        }
    }

    let location = query.location.trim();
    if !location.is_empty() {
        url.push_str(&encode_component(location));
        url.push_str("_rb/");
    }

    let mut params: Vec<String> = Vec::new();

    if let Some(home_type) = selected(&query.home_type) {
        let lowered = home_type.to_lowercase();
        let singular = lowered.strip_suffix('s').unwrap_or(&lowered);
        params.push(format!("home_type={}", encode_component(singular)));
    }

    if let Some(days) = selected(&query.days_on_market) {
        params.push(format!(
            "days_on_zillow={}",
            encode_component(&strip_day_suffix(&days.to_lowercase()))
        ));
    }

    if query.min_price > 0 {
        params.push(format!("price_min={}", query.min_price));
    }
    if query.max_price > 0 {
        params.push(format!("price_max={}", query.max_price));
    }

    if !params.is_empty() {
        url.push('?');
        url.push_str(&params.join("&"));
    }

    url
}

/// Returns the trimmed value unless it is empty or the "Any" wildcard.
fn selected(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty() && trimmed != "Any").then_some(trimmed)
}

/// `"7 days"` -> `"7"`, `"1 day"` -> `"1"`. Other values pass through.
fn strip_day_suffix(value: &str) -> String {
    let without_unit = value
        .strip_suffix("days")
        .or_else(|| value.strip_suffix("day"));
    match without_unit {
        Some(rest) if rest.ends_with(char::is_whitespace) => rest.trim_end().to_string(),
        _ => value.to_string(),
    }
}
