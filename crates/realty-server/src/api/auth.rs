//! OAuth login, callback and session endpoints.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use realty_crm::{CrmError, CrmUser, OAuthService};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::middleware::RequestId;
use crate::session::{self, SetCookies, OAUTH_STATE_COOKIE};

use super::{ApiError, ApiResponse, AppState};

const SESSION_REPORTED_TTL_HOURS: i64 = 24;

#[derive(Debug, Deserialize)]
pub(super) struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
    #[serde(rename = "locationId")]
    location_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct SessionData {
    user: Option<CrmUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub(super) struct UserData {
    user: CrmUser,
    access_token: String,
}

#[derive(Debug, Serialize)]
pub(super) struct SuccessData {
    success: bool,
}

fn error_redirect(cookies: SetCookies, message: &str) -> Response {
    (cookies, Redirect::temporary(&format!("/?error={message}"))).into_response()
}

pub(super) async fn start_login(State(state): State<AppState>) -> Response {
    let oauth_state = OAuthService::generate_state();
    match state.oauth.authorization_url(&oauth_state) {
        Ok(url) => {
            tracing::info!(provider = %state.oauth.provider().name, "redirecting to OAuth provider");
            (state.cookies.oauth_state(&oauth_state), Redirect::temporary(&url)).into_response()
        }
        Err(CrmError::MissingCredential(_)) => {
            tracing::error!("GHL_CLIENT_ID is not configured");
            error_redirect(SetCookies::default(), "Missing+GoHighLevel+client+ID")
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to build authorization URL");
            error_redirect(SetCookies::default(), "Failed+to+initiate+authentication")
        }
    }
}

/// Completes the authorization-code flow and stores the session.
///
/// A provider `error` is passed back to the home page. The `state` parameter
/// must match the `oauth_state` cookie; a `state` without that cookie is
/// rejected. Users with a location land on `/dashboard`, others on
/// `/onboarding`.
pub(super) async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Response {
    let cookies = state.cookies.clear_oauth_state();

    if let Some(error) = params.error.as_deref().filter(|e| !e.is_empty()) {
        let description = params
            .error_description
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(error);
        tracing::warn!(error, description, "OAuth provider returned an error");
        let encoded = utf8_percent_encode(description, NON_ALPHANUMERIC).to_string();
        return error_redirect(cookies, &encoded);
    }

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        tracing::warn!("OAuth callback without an authorization code");
        return error_redirect(cookies, "No+authorization+code+provided");
    };

    let state_ok = match (
        session::read_cookie(&headers, OAUTH_STATE_COOKIE),
        params.state.as_deref(),
    ) {
        (Some(expected), received) => bool::from(
            expected
                .as_bytes()
                .ct_eq(received.unwrap_or_default().as_bytes()),
        ),
        (None, Some(_)) => false,
        (None, None) => true,
    };
    if !state_ok {
        tracing::warn!("OAuth callback state mismatch");
        return error_redirect(cookies, "Invalid+OAuth+state");
    }

    let tokens = match state.oauth.exchange_code(&code).await {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::error!(error = %e, "failed to exchange authorization code");
            return error_redirect(cookies, "Token+exchange+failed");
        }
    };

    let mut user = match state.oauth.fetch_user(&tokens.access_token).await {
        Ok(user) => user,
        Err(e) => {
            tracing::error!(error = %e, "failed to fetch user info");
            return error_redirect(cookies, "User+info+fetch+failed");
        }
    };
    if user.location_id.is_none() {
        user.location_id = tokens.location_id.clone().or(params.location_id);
    }

    let destination = if user.location_id.is_some() {
        "/dashboard"
    } else {
        "/onboarding"
    };
    tracing::info!(user_id = %user.id, destination, "OAuth login completed");

    let cookies = cookies.and(state.cookies.session(&tokens, Some(&user)));
    (cookies, Redirect::temporary(destination)).into_response()
}

/// Trades the refresh token cookie for new tokens. A rejected refresh clears
/// the session.
pub(super) async fn refresh(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
) -> Response {
    let Some(refresh_token) = session::read_refresh_token(&headers) else {
        return ApiError::new(req_id.0, "unauthorized", "No refresh token found").into_response();
    };
    let previous_user = session::read_user(&headers);

    let tokens = match state.oauth.refresh(&refresh_token).await {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::warn!(error = %e, "token refresh rejected; clearing session");
            return (
                state.cookies.clear_session(),
                ApiError::new(req_id.0, "unauthorized", "Failed to refresh token"),
            )
                .into_response();
        }
    };

    let user = match previous_user {
        Some(previous) => match state.oauth.fetch_user(&tokens.access_token).await {
            Ok(fresh) => Some(fresh.with_location_fallback(Some(&previous))),
            Err(e) => {
                tracing::warn!(error = %e, "user info refresh failed; keeping stored profile");
                Some(previous)
            }
        },
        None => None,
    };

    (
        state.cookies.session(&tokens, user.as_ref()),
        Json(ApiResponse::new(req_id.0, SuccessData { success: true })),
    )
        .into_response()
}

pub(super) async fn current_session(
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
) -> Json<ApiResponse<SessionData>> {
    let data = match (session::read_access_token(&headers), session::read_user(&headers)) {
        (Some(_), Some(user)) => SessionData {
            user: Some(user),
            expires: Some(Utc::now() + chrono::Duration::hours(SESSION_REPORTED_TTL_HOURS)),
        },
        _ => SessionData {
            user: None,
            expires: None,
        },
    };
    Json(ApiResponse::new(req_id.0, data))
}

pub(super) async fn user(
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<UserData>>, ApiError> {
    match (session::read_access_token(&headers), session::read_user(&headers)) {
        (Some(access_token), Some(user)) => Ok(Json(ApiResponse::new(
            req_id.0,
            UserData { user, access_token },
        ))),
        _ => Err(ApiError::new(req_id.0, "unauthorized", "Not authenticated")),
    }
}

pub(super) async fn sign_out(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    tracing::info!("session cleared");
    (
        state.cookies.clear_session(),
        Json(ApiResponse::new(req_id.0, SuccessData { success: true })),
    )
}

pub(super) async fn sign_out_redirect(State(state): State<AppState>) -> impl IntoResponse {
    tracing::info!("session cleared");
    (state.cookies.clear_session(), Redirect::temporary("/"))
}
