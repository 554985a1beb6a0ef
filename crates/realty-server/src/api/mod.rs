mod auth;
mod crm;
mod listings;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use realty_core::{AppConfig, ListingRecord};
use realty_crm::{CrmClient, CrmError, OAuthProvider, OAuthService};
use realty_listings::ListingSearch;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::{enforce_rate_limit, request_id, require_session, RateLimitState, RequestId};
use crate::session::CookiePolicy;

#[derive(Clone)]
pub struct AppState {
    pub oauth: Arc<OAuthService>,
    pub crm: Arc<CrmClient>,
    pub search: Arc<ListingSearch>,
    pub cookies: CookiePolicy,
}

impl AppState {
    /// Builds every service the routes need from the loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be constructed or a
    /// configured base URL does not parse.
    pub fn from_config(config: &AppConfig, fallback: Vec<ListingRecord>) -> anyhow::Result<Self> {
        let oauth = OAuthService::new(
            OAuthProvider::gohighlevel(&config.ghl),
            config.ghl.request_timeout_secs,
        )?;
        let crm = CrmClient::from_config(&config.ghl)?;
        let search = ListingSearch::from_config(&config.search, fallback)?;
        if !search.is_live() {
            tracing::warn!("BRIGHT_DATA_API_KEY not set; listing search serves fallback data only");
        }

        Ok(Self {
            oauth: Arc::new(oauth),
            crm: Arc::new(crm),
            search: Arc::new(search),
            cookies: CookiePolicy::new(config.secure_cookies()),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    listings: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(request_id: String, data: T) -> Self {
        Self {
            data,
            meta: ResponseMeta::new(request_id),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
                details: None,
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }

    /// Attaches a structured payload under `error.details`.
    #[must_use]
    pub fn with_details<T: Serialize>(mut self, details: &T) -> Self {
        self.error.details = serde_json::to_value(details).ok();
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" | "no_data" | "no_matches_in_range" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "upstream_error" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn map_crm_error(request_id: String, error: &CrmError) -> ApiError {
    match error {
        CrmError::Api { status: 401, .. } => {
            ApiError::new(request_id, "unauthorized", "CRM rejected the session")
        }
        CrmError::Api { status: 404, .. } => {
            ApiError::new(request_id, "not_found", "CRM resource not found")
        }
        CrmError::Api { .. } | CrmError::Http(_) | CrmError::Deserialize { .. } => {
            tracing::warn!(error = %error, "CRM request failed");
            ApiError::new(request_id, "upstream_error", "CRM request failed")
        }
        CrmError::MissingCredential(_) | CrmError::InvalidUrl { .. } => {
            tracing::error!(error = %error, "CRM client misconfigured");
            ApiError::new(request_id, "internal_error", "CRM integration is not configured")
        }
    }
}

/// Parses a JSON request body, mapping failures to a `bad_request` envelope.
pub(super) fn parse_json_body<T: DeserializeOwned>(
    request_id: &str,
    body: &[u8],
) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        ApiError::new(request_id, "bad_request", format!("invalid JSON body: {e}"))
    })
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-request-id"),
        ])
}

fn crm_router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/crm/locations", get(crm::list_locations))
        .route("/api/v1/crm/locations/{location_id}", get(crm::get_location))
        .route("/api/v1/crm/contacts", get(crm::list_contacts))
        .route("/api/v1/crm/pipelines", get(crm::list_pipelines))
        .route(
            "/api/v1/crm/opportunities",
            get(crm::list_opportunities).post(crm::create_opportunity),
        )
        .layer(axum::middleware::from_fn(require_session))
}

fn search_router() -> Router<AppState> {
    Router::new()
        .route("/api/zillow-search", post(listings::search_listings))
        .route("/api/v1/listings/search", post(listings::search_listings))
}

fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/gohighlevel", get(auth::start_login))
        .route("/api/auth/callback", get(auth::callback))
        .route("/api/auth/callback/gohighlevel", get(auth::callback))
        .route("/api/auth/gohighlevel/callback", get(auth::callback))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/auth/session", get(auth::current_session))
        .route("/api/auth/user", get(auth::user))
        .route(
            "/api/auth/signout",
            get(auth::sign_out_redirect).post(auth::sign_out),
        )
}

pub fn build_app(state: AppState, rate_limit: RateLimitState) -> Router {
    let limited = Router::new()
        .merge(crm_router())
        .merge(search_router())
        .layer(axum::middleware::from_fn_with_state(
            rate_limit,
            enforce_rate_limit,
        ));

    Router::new()
        .route("/api/v1/health", get(health))
        .merge(auth_router())
        .merge(limited)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let listings = if state.search.is_live() {
        "live"
    } else {
        "fallback"
    };
    Json(ApiResponse::new(
        req_id.0,
        HealthData {
            status: "ok",
            listings,
        },
    ))
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}

#[cfg(test)]
#[path = "router_test.rs"]
mod tests;
