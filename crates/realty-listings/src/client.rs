//! HTTP client for the Bright Data dataset API.
//!
//! Covers the three calls a listing search needs: trigger a scrape job,
//! check its progress, and download its snapshot. Every call carries its own
//! timeout, independent of the poll budget.

use std::time::Duration;

use realty_core::ListingSearchConfig;
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use serde_json::json;

use crate::error::{clean_error_message, ListingsError};
use crate::fetcher::SnapshotResultSource;
use crate::poller::SnapshotStatusSource;
use crate::types::{JobState, SearchJob, SnapshotStatus};

const DEFAULT_BASE_URL: &str = "https://api.brightdata.com/";
const DEFAULT_DATASET_ID: &str = "gd_lfqkr8wm13ixtbd8f5";
const DEFAULT_PRICE_HISTORY_DATASET_ID: &str = "gd_lxu1cz9r88uiqsosl";

/// Per-request timeouts for the three endpoint families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTimeouts {
    pub trigger: Duration,
    pub status: Duration,
    pub result: Duration,
}

impl Default for RequestTimeouts {
    fn default() -> Self {
        Self {
            trigger: Duration::from_secs(15),
            status: Duration::from_secs(5),
            result: Duration::from_secs(10),
        }
    }
}

impl RequestTimeouts {
    #[must_use]
    pub fn from_config(config: &ListingSearchConfig) -> Self {
        Self {
            trigger: Duration::from_millis(config.trigger_timeout_ms),
            status: Duration::from_millis(config.status_timeout_ms),
            result: Duration::from_millis(config.result_timeout_ms),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TriggerResponse {
    snapshot_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProgressResponse {
    status: Option<String>,
    records: Option<u64>,
    errors: Option<u64>,
    error_codes: Option<serde_json::Value>,
}

/// Client for the Bright Data `datasets/v3` API.
///
/// Use [`BrightDataClient::new`] for production or
/// [`BrightDataClient::with_base_url`] to point at a mock server in tests.
pub struct BrightDataClient {
    client: Client,
    api_key: String,
    base_url: Url,
    dataset_id: String,
    price_history_dataset_id: String,
    timeouts: RequestTimeouts,
}

impl BrightDataClient {
    /// Creates a client pointed at the production Bright Data API.
    ///
    /// # Errors
    ///
    /// Returns [`ListingsError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(api_key: &str, timeouts: RequestTimeouts) -> Result<Self, ListingsError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL, timeouts)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`ListingsError::Http`] if the `reqwest::Client` cannot be
    /// built, or [`ListingsError::InvalidBaseUrl`] if `base_url` does not
    /// parse.
    pub fn with_base_url(
        api_key: &str,
        base_url: &str,
        timeouts: RequestTimeouts,
    ) -> Result<Self, ListingsError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .user_agent("realty/0.1 (listing-search)")
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let parsed = Url::parse(&normalised).map_err(|e| ListingsError::InvalidBaseUrl {
            base_url: base_url.to_owned(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(ListingsError::InvalidBaseUrl {
                base_url: base_url.to_owned(),
                reason: "URL cannot be used as a base".to_string(),
            });
        }

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            base_url: parsed,
            dataset_id: DEFAULT_DATASET_ID.to_string(),
            price_history_dataset_id: DEFAULT_PRICE_HISTORY_DATASET_ID.to_string(),
            timeouts,
        })
    }

    /// Builds a client from configuration. Returns `Ok(None)` when no API key
    /// is configured, which puts searches in fallback-only mode.
    ///
    /// # Errors
    ///
    /// Same as [`BrightDataClient::with_base_url`].
    pub fn from_config(config: &ListingSearchConfig) -> Result<Option<Self>, ListingsError> {
        let Some(api_key) = config.bright_data_api_key.as_deref() else {
            return Ok(None);
        };
        let client = Self::with_base_url(
            api_key,
            &config.bright_data_base_url,
            RequestTimeouts::from_config(config),
        )?
        .with_datasets(&config.dataset_id, &config.price_history_dataset_id);
        Ok(Some(client))
    }

    /// Overrides the listing and price-history dataset ids.
    #[must_use]
    pub fn with_datasets(mut self, dataset_id: &str, price_history_dataset_id: &str) -> Self {
        dataset_id.clone_into(&mut self.dataset_id);
        price_history_dataset_id.clone_into(&mut self.price_history_dataset_id);
        self
    }

    /// Starts one scrape job covering every URL in `urls`.
    ///
    /// # Errors
    ///
    /// - [`ListingsError::UnexpectedStatus`] on a non-2xx response.
    /// - [`ListingsError::Deserialize`] if the body is not the expected JSON.
    /// - [`ListingsError::MissingSnapshotId`] if no snapshot id came back.
    /// - [`ListingsError::Http`] on network failure or timeout.
    pub async fn trigger(&self, urls: &[&str]) -> Result<SearchJob, ListingsError> {
        let inputs: Vec<serde_json::Value> = urls.iter().map(|url| json!({ "url": url })).collect();
        self.trigger_dataset(&self.dataset_id, &inputs).await
    }

    /// Starts a price-history job for a single property id.
    ///
    /// # Errors
    ///
    /// Same as [`BrightDataClient::trigger`].
    pub async fn trigger_price_history(&self, zpid: &str) -> Result<SearchJob, ListingsError> {
        let inputs = [json!({ "zpid": zpid })];
        self.trigger_dataset(&self.price_history_dataset_id, &inputs)
            .await
    }

    async fn trigger_dataset(
        &self,
        dataset_id: &str,
        inputs: &[serde_json::Value],
    ) -> Result<SearchJob, ListingsError> {
        let mut url = self.endpoint(&["datasets", "v3", "trigger"])?;
        url.query_pairs_mut()
            .append_pair("dataset_id", dataset_id)
            .append_pair("format", "json")
            .append_pair("uncompressed_webhook", "true");

        tracing::debug!(dataset_id, inputs = inputs.len(), "triggering snapshot job");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeouts.trigger)
            .json(inputs)
            .send()
            .await?;
        let response = Self::ensure_success(response, "trigger").await?;

        let body = response.text().await?;
        let parsed: TriggerResponse =
            serde_json::from_str(&body).map_err(|e| ListingsError::Deserialize {
                context: format!("trigger response for dataset {dataset_id}"),
                source: e,
            })?;

        let job_id = parsed
            .snapshot_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(ListingsError::MissingSnapshotId)?;

        tracing::info!(job_id = %job_id, dataset_id, "snapshot job started");
        Ok(SearchJob::new(job_id))
    }

    /// Queries the progress of a snapshot job.
    ///
    /// A 404 means the snapshot has not been registered yet and is reported
    /// as a pending `initializing` status rather than an error.
    ///
    /// # Errors
    ///
    /// - [`ListingsError::UnexpectedStatus`] on any other non-2xx response.
    /// - [`ListingsError::Deserialize`] if the body is not the expected JSON.
    /// - [`ListingsError::Http`] on network failure or timeout.
    pub async fn progress(&self, job_id: &str) -> Result<SnapshotStatus, ListingsError> {
        let url = self.endpoint(&["datasets", "v3", "progress", job_id])?;

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeouts.status)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(job_id, "snapshot not registered yet");
            return Ok(SnapshotStatus {
                state: JobState::Pending,
                raw_status: "initializing".to_string(),
                records: Some(0),
                errors: Some(0),
                error_codes: None,
            });
        }
        let response = Self::ensure_success(response, "progress").await?;

        let body = response.text().await?;
        let parsed: ProgressResponse =
            serde_json::from_str(&body).map_err(|e| ListingsError::Deserialize {
                context: format!("progress({job_id})"),
                source: e,
            })?;

        let raw_status = parsed.status.unwrap_or_else(|| "unknown".to_string());
        Ok(SnapshotStatus {
            state: JobState::from_raw(&raw_status),
            raw_status,
            records: parsed.records,
            errors: parsed.errors,
            error_codes: parsed.error_codes,
        })
    }

    /// Downloads the raw snapshot body. Parsing is left to
    /// [`crate::parse_payload`] because the payload shape varies.
    ///
    /// # Errors
    ///
    /// - [`ListingsError::UnexpectedStatus`] on a non-2xx response.
    /// - [`ListingsError::Http`] on network failure or timeout.
    pub async fn snapshot(&self, job_id: &str) -> Result<String, ListingsError> {
        let url = self.endpoint(&["datasets", "v3", "snapshot", job_id])?;

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.timeouts.result)
            .send()
            .await?;
        let response = Self::ensure_success(response, "snapshot").await?;

        Ok(response.text().await?)
    }

    /// Appends percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ListingsError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ListingsError::InvalidBaseUrl {
                base_url: self.base_url.to_string(),
                reason: "URL cannot be used as a base".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn ensure_success(response: Response, endpoint: &str) -> Result<Response, ListingsError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ListingsError::UnexpectedStatus {
            status: status.as_u16(),
            endpoint: endpoint.to_string(),
            message: clean_error_message(status.as_u16(), &body),
        })
    }
}

impl SnapshotStatusSource for BrightDataClient {
    async fn status(&self, job_id: &str) -> Result<SnapshotStatus, ListingsError> {
        self.progress(job_id).await
    }
}

impl SnapshotResultSource for BrightDataClient {
    async fn result_payload(&self, job_id: &str) -> Result<String, ListingsError> {
        self.snapshot(job_id).await
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
