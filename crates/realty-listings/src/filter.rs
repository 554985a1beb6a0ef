use realty_core::ListingRecord;

/// Records inside a price range, truncated to a result limit.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredListings {
    pub records: Vec<ListingRecord>,
    /// Matches before truncation.
    pub total_matched: usize,
}

/// Keeps records with `min_price <= price <= max_price`, in input order, and
/// returns at most `limit` of them.
#[must_use]
pub fn filter_by_price(
    records: &[ListingRecord],
    min_price: u64,
    max_price: u64,
    limit: usize,
) -> FilteredListings {
    let matched: Vec<&ListingRecord> = records
        .iter()
        .filter(|record| record.price_within(min_price, max_price))
        .collect();

    FilteredListings {
        total_matched: matched.len(),
        records: matched.into_iter().take(limit).cloned().collect(),
    }
}
