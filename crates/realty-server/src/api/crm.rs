//! Session-protected proxies to the Go High Level REST API.

use std::future::Future;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use realty_crm::{Contact, CrmError, Location, NewOpportunity, Opportunity, Pipeline};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;
use crate::session::{Session, SetCookies};

use super::{map_crm_error, parse_json_body, ApiError, ApiResponse, AppState};

type ProxyResult<T> = Result<(SetCookies, Json<ApiResponse<T>>), ApiError>;

#[derive(Debug, Deserialize)]
pub(super) struct LocationFilter {
    location_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PipelineFilter {
    pipeline_id: Option<String>,
}

/// Runs `call` with the session's access token. When the CRM rejects the
/// token and a refresh token is available, refreshes once and retries; the
/// returned cookies then carry the new session.
async fn with_session_refresh<T, F, Fut>(
    state: &AppState,
    session: &Session,
    call: F,
) -> Result<(T, SetCookies), CrmError>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<T, CrmError>>,
{
    match call(session.access_token.clone()).await {
        Err(err) if err.is_unauthorized() => {
            let Some(refresh_token) = session.refresh_token.as_deref() else {
                return Err(err);
            };
            tracing::info!("CRM rejected access token; refreshing session");
            let tokens = state.oauth.refresh(refresh_token).await?;
            let value = call(tokens.access_token.clone()).await?;
            Ok((value, state.cookies.session(&tokens, session.user.as_ref())))
        }
        other => other.map(|value| (value, SetCookies::default())),
    }
}

async fn proxy<T, F, Fut>(
    state: &AppState,
    req_id: RequestId,
    session: &Session,
    call: F,
) -> ProxyResult<T>
where
    T: Serialize,
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<T, CrmError>>,
{
    let (data, cookies) = with_session_refresh(state, session, call)
        .await
        .map_err(|e| map_crm_error(req_id.0.clone(), &e))?;
    Ok((cookies, Json(ApiResponse::new(req_id.0, data))))
}

/// Explicit `location_id`, else the location stored with the session user.
fn resolve_location_id(
    req_id: &RequestId,
    session: &Session,
    filter: LocationFilter,
) -> Result<String, ApiError> {
    filter
        .location_id
        .filter(|id| !id.trim().is_empty())
        .or_else(|| session.user.as_ref().and_then(|u| u.location_id.clone()))
        .ok_or_else(|| ApiError::new(req_id.0.clone(), "bad_request", "location_id is required"))
}

pub(super) async fn list_locations(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(session): Extension<Session>,
) -> ProxyResult<Vec<Location>> {
    let crm = state.crm.as_ref();
    proxy(&state, req_id, &session, move |token| async move {
        crm.list_locations(&token).await
    })
    .await
}

pub(super) async fn get_location(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(session): Extension<Session>,
    Path(location_id): Path<String>,
) -> ProxyResult<Location> {
    let crm = state.crm.as_ref();
    let location_id = location_id.as_str();
    proxy(&state, req_id, &session, move |token| async move {
        crm.get_location(&token, location_id).await
    })
    .await
}

pub(super) async fn list_contacts(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(session): Extension<Session>,
    Query(filter): Query<LocationFilter>,
) -> ProxyResult<Vec<Contact>> {
    let location_id = resolve_location_id(&req_id, &session, filter)?;
    let crm = state.crm.as_ref();
    let location_id = location_id.as_str();
    proxy(&state, req_id, &session, move |token| async move {
        crm.list_contacts(&token, location_id).await
    })
    .await
}

pub(super) async fn list_pipelines(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(session): Extension<Session>,
    Query(filter): Query<LocationFilter>,
) -> ProxyResult<Vec<Pipeline>> {
    let location_id = resolve_location_id(&req_id, &session, filter)?;
    let crm = state.crm.as_ref();
    let location_id = location_id.as_str();
    proxy(&state, req_id, &session, move |token| async move {
        crm.list_pipelines(&token, location_id).await
    })
    .await
}

pub(super) async fn list_opportunities(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(session): Extension<Session>,
    Query(filter): Query<PipelineFilter>,
) -> ProxyResult<Vec<Opportunity>> {
    let Some(pipeline_id) = filter.pipeline_id.filter(|id| !id.trim().is_empty()) else {
        return Err(ApiError::new(req_id.0, "bad_request", "pipeline_id is required"));
    };
    let crm = state.crm.as_ref();
    let pipeline_id = pipeline_id.as_str();
    proxy(&state, req_id, &session, move |token| async move {
        crm.list_opportunities(&token, pipeline_id).await
    })
    .await
}

pub(super) async fn create_opportunity(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(session): Extension<Session>,
    body: Bytes,
) -> Result<(StatusCode, SetCookies, Json<ApiResponse<Opportunity>>), ApiError> {
    let mut opportunity: NewOpportunity = parse_json_body(&req_id.0, &body)?;
    if opportunity.name.trim().is_empty() || opportunity.pipeline_id.trim().is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "name and pipelineId are required",
        ));
    }
    if opportunity.location_id.is_none() {
        opportunity.location_id = session.user.as_ref().and_then(|u| u.location_id.clone());
    }

    let crm = state.crm.as_ref();
    let opportunity = &opportunity;
    let (cookies, json) = proxy(&state, req_id, &session, move |token| async move {
        crm.create_opportunity(&token, opportunity).await
    })
    .await?;
    Ok((StatusCode::CREATED, cookies, json))
}
