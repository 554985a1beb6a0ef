//! Property listing search backed by Bright Data snapshot jobs.
//!
//! A search triggers a remote scrape job, polls it within a fixed budget,
//! fetches and normalizes whatever the job produced, and filters the result
//! by price. Every failure on the remote path degrades to the configured
//! fallback dataset instead of surfacing an error.

pub mod client;
pub mod error;
pub mod fetcher;
pub mod filter;
pub mod normalize;
pub mod poller;
pub mod search;
pub mod search_url;
pub mod types;

pub use client::{BrightDataClient, RequestTimeouts};
pub use error::ListingsError;
pub use fetcher::{parse_payload, FetchedListings, ResultFetcher, SnapshotResultSource};
pub use filter::{filter_by_price, FilteredListings};
pub use normalize::normalize_listing;
pub use poller::{PollBudget, PollReport, SnapshotPoller, SnapshotStatusSource, StopReason};
pub use search::ListingSearch;
pub use search_url::build_search_url;
pub use types::{
    JobState, SearchJob, SearchOutcome, SearchQuery, SearchReport, SnapshotStatus, TerminalState,
};
