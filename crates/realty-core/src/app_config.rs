use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Go High Level OAuth application and REST API settings.
#[derive(Clone)]
pub struct GhlConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scope: String,
    pub authorize_url: String,
    pub api_base_url: String,
    pub api_version: String,
    pub request_timeout_secs: u64,
}

/// Bright Data dataset settings plus the poll budget for listing searches.
#[derive(Clone)]
pub struct ListingSearchConfig {
    /// `None` puts the search into fallback-only mode.
    pub bright_data_api_key: Option<String>,
    pub bright_data_base_url: String,
    pub dataset_id: String,
    pub price_history_dataset_id: String,
    pub max_wait_ms: u64,
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
    pub result_limit: usize,
    pub trigger_timeout_ms: u64,
    pub status_timeout_ms: u64,
    pub result_timeout_ms: u64,
}

impl ListingSearchConfig {
    #[must_use]
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub fallback_listings_path: PathBuf,
    pub ghl: GhlConfig,
    pub search: ListingSearchConfig,
}

impl AppConfig {
    /// Cookies are only marked `Secure` in production, where the app sits
    /// behind TLS.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.env == Environment::Production
    }
}

impl std::fmt::Debug for GhlConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GhlConfig")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[redacted]"),
            )
            .field("redirect_uri", &self.redirect_uri)
            .field("scope", &self.scope)
            .field("authorize_url", &self.authorize_url)
            .field("api_base_url", &self.api_base_url)
            .field("api_version", &self.api_version)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl std::fmt::Debug for ListingSearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListingSearchConfig")
            .field(
                "bright_data_api_key",
                &self.bright_data_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("bright_data_base_url", &self.bright_data_base_url)
            .field("dataset_id", &self.dataset_id)
            .field("price_history_dataset_id", &self.price_history_dataset_id)
            .field("max_wait_ms", &self.max_wait_ms)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("max_poll_attempts", &self.max_poll_attempts)
            .field("result_limit", &self.result_limit)
            .field("trigger_timeout_ms", &self.trigger_timeout_ms)
            .field("status_timeout_ms", &self.status_timeout_ms)
            .field("result_timeout_ms", &self.result_timeout_ms)
            .finish()
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("fallback_listings_path", &self.fallback_listings_path)
            .field("ghl", &self.ghl)
            .field("search", &self.search)
            .finish()
    }
}
