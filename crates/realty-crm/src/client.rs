//! HTTP client for the Go High Level REST API.
//!
//! Every call takes the caller's access token; the client itself holds no
//! credentials. Reads are retried on transient failures, writes are not.

use std::time::Duration;

use realty_core::GhlConfig;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CrmError;
use crate::oauth::read_json;
use crate::retry::retry_with_backoff;
use crate::types::{
    Contact, ContactsEnvelope, CrmUser, Location, LocationBody, LocationsEnvelope, NewLocation,
    NewOpportunity, OpportunitiesEnvelope, Opportunity, OpportunityBody, Pipeline,
    PipelinesEnvelope,
};

const DEFAULT_BASE_URL: &str = "https://services.leadconnectorhq.com/";
const DEFAULT_API_VERSION: &str = "2023-07-01";
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_BACKOFF_BASE_MS: u64 = 500;

/// Client for the Go High Level REST API.
///
/// Use [`CrmClient::new`] for production or [`CrmClient::with_base_url`] to
/// point at a mock server in tests.
pub struct CrmClient {
    client: Client,
    base_url: Url,
    api_version: String,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl CrmClient {
    /// Creates a client pointed at the production API.
    ///
    /// # Errors
    ///
    /// Returns [`CrmError::Http`] if the underlying `reqwest::Client` cannot
    /// be constructed.
    pub fn new(timeout_secs: u64) -> Result<Self, CrmError> {
        Self::with_base_url(DEFAULT_BASE_URL, DEFAULT_API_VERSION, timeout_secs)
    }

    /// # Errors
    ///
    /// Same as [`CrmClient::with_base_url`].
    pub fn from_config(config: &GhlConfig) -> Result<Self, CrmError> {
        Self::with_base_url(
            &config.api_base_url,
            &config.api_version,
            config.request_timeout_secs,
        )
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`CrmError::Http`] if the `reqwest::Client` cannot be built,
    /// or [`CrmError::InvalidUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        base_url: &str,
        api_version: &str,
        timeout_secs: u64,
    ) -> Result<Self, CrmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("realty/0.1 (crm)")
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let parsed = Url::parse(&normalised).map_err(|e| CrmError::InvalidUrl {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(CrmError::InvalidUrl {
                url: base_url.to_owned(),
                reason: "URL cannot be used as a base".to_string(),
            });
        }

        Ok(Self {
            client,
            base_url: parsed,
            api_version: api_version.to_owned(),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
        })
    }

    /// Overrides the retry policy for read calls. `max_retries = 0` disables
    /// retries.
    #[must_use]
    pub fn with_retry_policy(mut self, max_retries: u32, backoff_base_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    /// `GET /locations/v1`.
    ///
    /// # Errors
    ///
    /// - [`CrmError::Api`] on a non-2xx response (401 for a bad token).
    /// - [`CrmError::Http`] on network failure.
    /// - [`CrmError::Deserialize`] if the response shape is unexpected.
    pub async fn list_locations(&self, access_token: &str) -> Result<Vec<Location>, CrmError> {
        let url = self.endpoint(&["locations", "v1"], &[])?;
        let envelope: LocationsEnvelope = self.get_json(access_token, url, "locations").await?;
        Ok(envelope.locations)
    }

    /// `GET /locations/v1/{id}`.
    ///
    /// # Errors
    ///
    /// See [`CrmClient::list_locations`].
    pub async fn get_location(
        &self,
        access_token: &str,
        location_id: &str,
    ) -> Result<Location, CrmError> {
        let url = self.endpoint(&["locations", "v1", location_id], &[])?;
        let body: LocationBody = self
            .get_json(access_token, url, &format!("location({location_id})"))
            .await?;
        Ok(body.into_inner())
    }

    /// `POST /locations/v1`. Not retried.
    ///
    /// # Errors
    ///
    /// See [`CrmClient::list_locations`].
    pub async fn create_location(
        &self,
        access_token: &str,
        location: &NewLocation,
    ) -> Result<Location, CrmError> {
        let url = self.endpoint(&["locations", "v1"], &[])?;
        let body: LocationBody = self
            .post_json(access_token, url, location, "create location")
            .await?;
        let created = body.into_inner();
        tracing::info!(location_id = %created.id, "CRM location created");
        Ok(created)
    }

    /// `GET /contacts/v1?locationId=`.
    ///
    /// # Errors
    ///
    /// See [`CrmClient::list_locations`].
    pub async fn list_contacts(
        &self,
        access_token: &str,
        location_id: &str,
    ) -> Result<Vec<Contact>, CrmError> {
        let url = self.endpoint(&["contacts", "v1"], &[("locationId", location_id)])?;
        let envelope: ContactsEnvelope = self
            .get_json(access_token, url, &format!("contacts(locationId={location_id})"))
            .await?;
        Ok(envelope.contacts)
    }

    /// `GET /pipelines/v1?locationId=`.
    ///
    /// # Errors
    ///
    /// See [`CrmClient::list_locations`].
    pub async fn list_pipelines(
        &self,
        access_token: &str,
        location_id: &str,
    ) -> Result<Vec<Pipeline>, CrmError> {
        let url = self.endpoint(&["pipelines", "v1"], &[("locationId", location_id)])?;
        let envelope: PipelinesEnvelope = self
            .get_json(access_token, url, &format!("pipelines(locationId={location_id})"))
            .await?;
        Ok(envelope.pipelines)
    }

    /// `GET /opportunities/v1?pipelineId=`.
    ///
    /// # Errors
    ///
    /// See [`CrmClient::list_locations`].
    pub async fn list_opportunities(
        &self,
        access_token: &str,
        pipeline_id: &str,
    ) -> Result<Vec<Opportunity>, CrmError> {
        let url = self.endpoint(&["opportunities", "v1"], &[("pipelineId", pipeline_id)])?;
        let envelope: OpportunitiesEnvelope = self
            .get_json(
                access_token,
                url,
                &format!("opportunities(pipelineId={pipeline_id})"),
            )
            .await?;
        Ok(envelope.opportunities)
    }

    /// `POST /opportunities/v1`. Not retried.
    ///
    /// # Errors
    ///
    /// See [`CrmClient::list_locations`].
    pub async fn create_opportunity(
        &self,
        access_token: &str,
        opportunity: &NewOpportunity,
    ) -> Result<Opportunity, CrmError> {
        let url = self.endpoint(&["opportunities", "v1"], &[])?;
        let body: OpportunityBody = self
            .post_json(access_token, url, opportunity, "create opportunity")
            .await?;
        let created = body.into_inner();
        tracing::info!(opportunity_id = %created.id, pipeline_id = %opportunity.pipeline_id, "CRM opportunity created");
        Ok(created)
    }

    /// `GET /oauth/user`.
    ///
    /// # Errors
    ///
    /// See [`CrmClient::list_locations`].
    pub async fn user_info(&self, access_token: &str) -> Result<CrmUser, CrmError> {
        let url = self.endpoint(&["oauth", "user"], &[])?;
        self.get_json(access_token, url, "oauth user").await
    }

    fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, CrmError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| CrmError::InvalidUrl {
                url: self.base_url.to_string(),
                reason: "URL cannot be used as a base".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder, access_token: &str) -> RequestBuilder {
        request
            .bearer_auth(access_token)
            .header("Version", &self.api_version)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        access_token: &str,
        url: Url,
        context: &str,
    ) -> Result<T, CrmError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let url = url.clone();
            async move {
                let response = self
                    .authorized(self.client.get(url), access_token)
                    .send()
                    .await?;
                read_json(response, context).await
            }
        })
        .await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        access_token: &str,
        url: Url,
        body: &B,
        context: &str,
    ) -> Result<T, CrmError> {
        let response = self
            .authorized(self.client.post(url), access_token)
            .json(body)
            .send()
            .await?;
        read_json(response, context).await
    }
}
