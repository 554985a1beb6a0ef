//! Maps loosely-shaped scraped records onto [`ListingRecord`].
//!
//! Each output field has an ordered list of candidate JSON paths. The first
//! candidate holding a "present" value wins; empty strings, zero, `null` and
//! `false` are treated as absent so the next candidate is tried.

use realty_core::ListingRecord;
use serde_json::Value;
use sha2::{Digest, Sha256};

const PLACEHOLDER_IMAGE_URL: &str = "https://photos.zillowstatic.com/fp/default.jpg";
const DETAIL_URL_PREFIX: &str = "https://www.zillow.com/homedetails/";

/// Ordered candidate paths for a text field plus its default.
struct TextField {
    paths: &'static [&'static str],
    default: &'static str,
}

const ID: &[&str] = &["zpid", "id"];

const ADDRESS: TextField = TextField {
    paths: &[
        "address",
        "streetAddress",
        "location.address",
        "address.streetAddress",
    ],
    default: "Unknown Address",
};
const CITY: TextField = TextField {
    paths: &["city", "location.city", "address.city"],
    default: "Unknown City",
};
const STATE: TextField = TextField {
    paths: &["state", "location.state", "address.state"],
    default: "Unknown State",
};
const ZIPCODE: TextField = TextField {
    paths: &["zipcode", "location.zipcode", "postalCode", "address.zipcode"],
    default: "Unknown Zip",
};
const HOME_TYPE: TextField = TextField {
    paths: &["homeType", "propertyType"],
    default: "Unknown",
};
const HOME_STATUS: TextField = TextField {
    paths: &["homeStatus", "status"],
    default: "FOR_SALE",
};
const IMAGE_URL: TextField = TextField {
    paths: &["imageUrl", "imgSrc", "image"],
    default: PLACEHOLDER_IMAGE_URL,
};
const DETAIL_URL: &[&str] = &["detailUrl", "url"];

const PRICE: &[&str] = &["price"];
const BEDROOMS: &[&str] = &["bedrooms", "beds"];
const BATHROOMS: &[&str] = &["bathrooms", "baths"];
const LIVING_AREA: &[&str] = &["livingArea", "sqft", "area"];
const DAYS_ON_MARKET: &[&str] = &["daysOnZillow", "daysOnMarket"];

/// Normalizes one raw scraped record.
///
/// Never fails: missing or unusable fields fall back to their defaults. A
/// record without an id gets a deterministic `gen-` id derived from its
/// content, so normalizing the same record twice gives the same output.
#[must_use]
pub fn normalize_listing(raw: &Value) -> ListingRecord {
    let id = first_text(raw, ID).unwrap_or_else(|| synthesized_id(raw));
    let detail_url = first_text(raw, DETAIL_URL)
        .unwrap_or_else(|| format!("{DETAIL_URL_PREFIX}{id}_zpid/"));

    ListingRecord {
        address: text_field(raw, &ADDRESS),
        city: text_field(raw, &CITY),
        state: text_field(raw, &STATE),
        zipcode: text_field(raw, &ZIPCODE),
        price: first_price(raw, PRICE),
        bedrooms: to_u32(first_number(raw, BEDROOMS)),
        bathrooms: first_number(raw, BATHROOMS),
        living_area: to_u32(first_number(raw, LIVING_AREA)),
        home_type: text_field(raw, &HOME_TYPE),
        home_status: text_field(raw, &HOME_STATUS),
        days_on_market: to_u32(first_number(raw, DAYS_ON_MARKET)),
        image_url: text_field(raw, &IMAGE_URL),
        detail_url,
        id,
    }
}

fn lookup<'a>(raw: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(raw, |value, key| value.get(key))
}

fn text_field(raw: &Value, field: &TextField) -> String {
    first_text(raw, field.paths).unwrap_or_else(|| field.default.to_string())
}

/// First candidate that is a non-empty string or a non-zero number.
fn first_text(raw: &Value, paths: &[&str]) -> Option<String> {
    paths.iter().find_map(|path| match lookup(raw, path)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) if n.as_f64().is_some_and(|f| f != 0.0) => Some(n.to_string()),
        _ => None,
    })
}

/// First candidate that is a non-zero number or a string parsing to one.
fn first_number(raw: &Value, paths: &[&str]) -> f64 {
    paths
        .iter()
        .find_map(|path| {
            let n = match lookup(raw, path)? {
                Value::Number(n) => n.as_f64()?,
                Value::String(s) => s.trim().parse::<f64>().ok()?,
                _ => return None,
            };
            (n.is_finite() && n != 0.0).then_some(n)
        })
        .unwrap_or(0.0)
}

/// Prices may arrive as numbers or formatted strings like `"$1,250,000"`.
/// Strings keep only their digits.
fn first_price(raw: &Value, paths: &[&str]) -> u64 {
    paths
        .iter()
        .find_map(|path| {
            let price = match lookup(raw, path)? {
                Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(to_u64))?,
                Value::String(s) => {
                    let digits: String = s.chars().filter(char::is_ascii_digit).collect();
                    digits.parse::<u64>().ok()?
                }
                _ => return None,
            };
            (price != 0).then_some(price)
        })
        .unwrap_or(0)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_u32(value: f64) -> u32 {
    value.round().clamp(0.0, f64::from(u32::MAX)) as u32
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_u64(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}

/// `gen-` plus the first 16 hex chars of the SHA-256 of the record's JSON.
/// `serde_json` maps are key-sorted, so equal records hash equally.
fn synthesized_id(raw: &Value) -> String {
    let canonical = raw.to_string();
    let digest = Sha256::digest(canonical.as_bytes());
    let hex: String = digest
        .iter()
        .take(8)
        .map(|byte| format!("{byte:02x}"))
        .collect();
    format!("gen-{hex}")
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
