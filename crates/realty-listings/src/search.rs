//! End-to-end listing search: trigger, poll, fetch, filter.

use realty_core::{ListingRecord, ListingSearchConfig};
use tokio::time::Instant;

use crate::client::BrightDataClient;
use crate::error::ListingsError;
use crate::fetcher::{FetchedListings, ResultFetcher};
use crate::filter::filter_by_price;
use crate::poller::{PollBudget, SnapshotPoller};
use crate::search_url::build_search_url;
use crate::types::{SearchOutcome, SearchQuery, SearchReport};

/// Runs listing searches against Bright Data, degrading to a fixed fallback
/// dataset whenever the remote path cannot produce data.
///
/// Without a client (no API key configured) every search is served from the
/// fallback dataset.
pub struct ListingSearch {
    client: Option<BrightDataClient>,
    fallback: Vec<ListingRecord>,
    budget: PollBudget,
    result_limit: usize,
}

impl ListingSearch {
    #[must_use]
    pub fn new(
        client: Option<BrightDataClient>,
        fallback: Vec<ListingRecord>,
        budget: PollBudget,
        result_limit: usize,
    ) -> Self {
        Self {
            client,
            fallback,
            budget,
            result_limit,
        }
    }

    /// # Errors
    ///
    /// Returns [`ListingsError`] if the Bright Data client cannot be built
    /// from the configured base URL.
    pub fn from_config(
        config: &ListingSearchConfig,
        fallback: Vec<ListingRecord>,
    ) -> Result<Self, ListingsError> {
        Ok(Self::new(
            BrightDataClient::from_config(config)?,
            fallback,
            PollBudget::from_config(config),
            config.result_limit,
        ))
    }

    /// `true` when searches hit the remote API rather than only the fallback
    /// dataset.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.client.is_some()
    }

    /// Runs one search. Never fails: remote errors are logged and replaced by
    /// the fallback dataset, reported through `used_fallback`.
    pub async fn run(&self, query: &SearchQuery) -> SearchReport {
        let started = Instant::now();

        let fetched = match &self.client {
            Some(client) => self.fetch_remote(client, query, started).await,
            None => {
                tracing::debug!("no Bright Data API key configured, using fallback listings");
                FetchedListings::fallback(&self.fallback)
            }
        };

        let filtered = filter_by_price(
            &fetched.records,
            query.min_price,
            query.max_price,
            self.result_limit,
        );

        let outcome = if fetched.records.is_empty() {
            SearchOutcome::NoData
        } else if filtered.total_matched == 0 {
            SearchOutcome::NoMatchesInRange
        } else {
            SearchOutcome::Found
        };

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            location = %query.location,
            outcome = ?outcome,
            available = fetched.records.len(),
            total_matched = filtered.total_matched,
            returned = filtered.records.len(),
            used_fallback = fetched.from_fallback,
            elapsed_ms,
            "listing search finished"
        );

        SearchReport {
            outcome,
            records: filtered.records,
            total_matched: filtered.total_matched,
            used_fallback: fetched.from_fallback,
            elapsed_ms,
        }
    }

    async fn fetch_remote(
        &self,
        client: &BrightDataClient,
        query: &SearchQuery,
        started: Instant,
    ) -> FetchedListings {
        let target = query
            .direct_property_url()
            .map_or_else(|| build_search_url(query), str::to_string);

        let job = match client.trigger(&[target.as_str()]).await {
            Ok(job) => job,
            Err(e) => {
                tracing::warn!(url = %target, error = %e, "snapshot trigger failed, using fallback listings");
                return FetchedListings::fallback(&self.fallback);
            }
        };

        let report = SnapshotPoller::new(client, self.budget)
            .poll_since(&job.job_id, started)
            .await;
        tracing::debug!(
            job_id = %job.job_id,
            attempts = report.attempts,
            stop_reason = ?report.stop_reason,
            "snapshot polling finished"
        );

        ResultFetcher::new(client, &self.fallback)
            .fetch(&job.job_id, report.terminal)
            .await
    }
}
