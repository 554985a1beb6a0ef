//! Search, job and status types shared by the poller, fetcher and search service.

use chrono::{DateTime, Utc};
use realty_core::ListingRecord;
use serde::{Deserialize, Serialize};

/// A remote scrape job started by a search. Lives only for the duration of
/// one search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchJob {
    pub job_id: String,
    pub created_at: DateTime<Utc>,
}

impl SearchJob {
    #[must_use]
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            created_at: Utc::now(),
        }
    }
}

/// Lifecycle state reported by the snapshot progress endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    Unknown,
}

impl JobState {
    /// Maps a raw provider status string onto a [`JobState`].
    ///
    /// `completed`, `done` and `ready` all mean the data can be downloaded;
    /// `failed` and `error` are terminal failures. Matching ignores case and
    /// surrounding whitespace.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "completed" | "done" | "ready" => JobState::Completed,
            "failed" | "error" => JobState::Failed,
            "running" => JobState::Running,
            "pending" | "initializing" | "starting" | "queued" => JobState::Pending,
            _ => JobState::Unknown,
        }
    }
}

/// One observation of a snapshot job's progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotStatus {
    pub state: JobState,
    /// The status string exactly as the provider sent it.
    pub raw_status: String,
    pub records: Option<u64>,
    pub errors: Option<u64>,
    /// Per-error-code counts, passed through untouched for logging.
    pub error_codes: Option<serde_json::Value>,
}

impl SnapshotStatus {
    #[must_use]
    pub fn from_raw(raw_status: &str) -> Self {
        Self {
            state: JobState::from_raw(raw_status),
            raw_status: raw_status.to_string(),
            records: None,
            errors: None,
            error_codes: None,
        }
    }
}

/// The single classification a poll loop ends with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    DataReady,
    FallbackRequired,
}

/// Search and filter parameters.
///
/// Field names follow the dashboard's request body (`homeType`,
/// `listingCategory`, `daysOnZillow`, ...); every field has a default so an
/// empty JSON object is a valid query.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchQuery {
    pub location: String,
    pub home_type: String,
    pub listing_category: String,
    #[serde(rename = "daysOnZillow", alias = "daysOnMarket")]
    pub days_on_market: String,
    pub min_price: u64,
    pub max_price: u64,
    /// A direct listing URL. Used instead of the constructed search URL when
    /// it points at zillow.com.
    pub property_url: Option<String>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            location: "Miami, FL".to_string(),
            home_type: "Houses".to_string(),
            listing_category: "House for sale".to_string(),
            days_on_market: String::new(),
            min_price: 1,
            max_price: 10_000_000,
            property_url: None,
        }
    }
}

impl SearchQuery {
    /// The direct listing URL, if one was supplied and it targets zillow.com.
    #[must_use]
    pub fn direct_property_url(&self) -> Option<&str> {
        self.property_url
            .as_deref()
            .map(str::trim)
            .filter(|url| url.contains("zillow.com"))
    }
}

/// How a search ended, from the caller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchOutcome {
    /// At least one record matched the price range.
    Found,
    /// The data source produced no records at all.
    NoData,
    /// Records were available but none fell inside the price range.
    NoMatchesInRange,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchReport {
    pub outcome: SearchOutcome,
    pub records: Vec<ListingRecord>,
    /// Number of records in range before truncation to the result limit.
    pub total_matched: usize,
    pub used_fallback: bool,
    pub elapsed_ms: u64,
}
