//! OAuth 2.0 authorization-code flow against a configurable provider.

use std::time::Duration;

use rand::distr::Alphanumeric;
use rand::Rng;
use realty_core::GhlConfig;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;

use crate::error::CrmError;
use crate::types::{CrmUser, TokenSet};

const STATE_LEN: usize = 32;

/// Endpoints and credentials of one OAuth provider.
#[derive(Clone)]
pub struct OAuthProvider {
    pub name: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scope: String,
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

impl OAuthProvider {
    /// Go High Level: marketplace authorize page, token and user-info
    /// endpoints under the API base URL.
    #[must_use]
    pub fn gohighlevel(config: &GhlConfig) -> Self {
        let api_base = config.api_base_url.trim_end_matches('/');
        Self {
            name: "gohighlevel".to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scope: config.scope.clone(),
            authorize_url: config.authorize_url.clone(),
            token_url: format!("{api_base}/oauth/token"),
            userinfo_url: format!("{api_base}/oauth/userinfo"),
        }
    }
}

impl std::fmt::Debug for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthProvider")
            .field("name", &self.name)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[redacted]"),
            )
            .field("redirect_uri", &self.redirect_uri)
            .field("scope", &self.scope)
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("userinfo_url", &self.userinfo_url)
            .finish()
    }
}

/// Authorization-code exchange, token refresh and user lookup for one
/// [`OAuthProvider`].
pub struct OAuthService {
    client: Client,
    provider: OAuthProvider,
}

impl OAuthService {
    /// # Errors
    ///
    /// Returns [`CrmError::Http`] if the underlying `reqwest::Client` cannot
    /// be constructed.
    pub fn new(provider: OAuthProvider, timeout_secs: u64) -> Result<Self, CrmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("realty/0.1 (crm-oauth)")
            .build()?;
        Ok(Self { client, provider })
    }

    #[must_use]
    pub fn provider(&self) -> &OAuthProvider {
        &self.provider
    }

    /// Random URL-safe token for the `state` parameter.
    #[must_use]
    pub fn generate_state() -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(STATE_LEN)
            .map(char::from)
            .collect()
    }

    /// Builds the provider's authorize URL for `state`.
    ///
    /// # Errors
    ///
    /// - [`CrmError::MissingCredential`] if no client id is configured.
    /// - [`CrmError::InvalidUrl`] if the authorize endpoint does not parse.
    pub fn authorization_url(&self, state: &str) -> Result<String, CrmError> {
        let client_id = self.client_id()?;
        let mut url =
            Url::parse(&self.provider.authorize_url).map_err(|e| CrmError::InvalidUrl {
                url: self.provider.authorize_url.clone(),
                reason: e.to_string(),
            })?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", client_id)
            .append_pair("redirect_uri", &self.provider.redirect_uri)
            .append_pair("scope", &self.provider.scope)
            .append_pair("state", state);
        Ok(url.to_string())
    }

    /// Exchanges an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// - [`CrmError::MissingCredential`] if client id or secret is missing.
    /// - [`CrmError::Api`] if the token endpoint rejects the code.
    /// - [`CrmError::Http`] / [`CrmError::Deserialize`] on transport or
    ///   response-shape failures.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet, CrmError> {
        let form = [
            ("client_id", self.client_id()?),
            ("client_secret", self.client_secret()?),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.provider.redirect_uri.as_str()),
        ];
        let tokens: TokenSet = self.token_request(&form, "authorization_code").await?;
        tracing::info!(
            provider = %self.provider.name,
            has_refresh_token = tokens.refresh_token.is_some(),
            expires_in = ?tokens.expires_in,
            "authorization code exchanged"
        );
        Ok(tokens)
    }

    /// Trades a refresh token for a new token set.
    ///
    /// # Errors
    ///
    /// Same as [`OAuthService::exchange_code`].
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, CrmError> {
        let form = [
            ("client_id", self.client_id()?),
            ("client_secret", self.client_secret()?),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        let tokens: TokenSet = self.token_request(&form, "refresh_token").await?;
        tracing::info!(provider = %self.provider.name, "access token refreshed");
        Ok(tokens)
    }

    /// Looks up the user the access token belongs to.
    ///
    /// # Errors
    ///
    /// - [`CrmError::Api`] if the token is rejected.
    /// - [`CrmError::Http`] / [`CrmError::Deserialize`] otherwise.
    pub async fn fetch_user(&self, access_token: &str) -> Result<CrmUser, CrmError> {
        let response = self
            .client
            .get(&self.provider.userinfo_url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        read_json(response, "userinfo").await
    }

    async fn token_request<T: DeserializeOwned>(
        &self,
        form: &[(&str, &str)],
        grant_type: &str,
    ) -> Result<T, CrmError> {
        let response = self
            .client
            .post(&self.provider.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await?;
        read_json(response, &format!("token ({grant_type})")).await
    }

    fn client_id(&self) -> Result<&str, CrmError> {
        self.provider
            .client_id
            .as_deref()
            .ok_or(CrmError::MissingCredential("client id"))
    }

    fn client_secret(&self) -> Result<&str, CrmError> {
        self.provider
            .client_secret
            .as_deref()
            .ok_or(CrmError::MissingCredential("client secret"))
    }
}

/// Checks the status and parses a JSON body into `T`.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: Response,
    context: &str,
) -> Result<T, CrmError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(CrmError::api(status.as_u16(), &body));
    }
    serde_json::from_str(&body).map_err(|e| CrmError::Deserialize {
        context: context.to_string(),
        source: e,
    })
}
