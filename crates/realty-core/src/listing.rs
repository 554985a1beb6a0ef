use serde::{Deserialize, Serialize};

/// A property listing normalized from whatever shape the data provider
/// returned. Every field is always populated; unknown values carry a
/// placeholder rather than being absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    /// Provider listing ID (Zillow `zpid`), or a content-derived ID when the
    /// provider did not send one.
    pub id: String,
    /// Street address line, e.g. `"456 Palm Avenue"`.
    pub address: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    /// Asking price in whole dollars. `0` when unknown.
    pub price: u64,
    pub bedrooms: u32,
    /// Fractional for half baths, e.g. `2.5`.
    pub bathrooms: f64,
    /// Interior area in square feet.
    pub living_area: u32,
    pub home_type: String,
    /// Listing status such as `"FOR_SALE"`.
    pub home_status: String,
    pub days_on_market: u32,
    pub image_url: String,
    pub detail_url: String,
}

impl ListingRecord {
    /// Returns `true` when `price` lies within `min..=max`.
    #[must_use]
    pub fn price_within(&self, min: u64, max: u64) -> bool {
        (min..=max).contains(&self.price)
    }
}
