use axum::{body::Bytes, extract::State, Extension, Json};
use realty_listings::{SearchOutcome, SearchQuery, SearchReport};

use crate::middleware::RequestId;

use super::{parse_json_body, ApiError, ApiResponse, AppState};

/// Runs a listing search. An empty body searches with the default query.
///
/// Only a `found` outcome is a 200; an empty data source or an empty price
/// range answers 404 with a distinct error code and the search report under
/// `error.details`.
pub(super) async fn search_listings(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Bytes,
) -> Result<Json<ApiResponse<SearchReport>>, ApiError> {
    let query: SearchQuery = if body.iter().all(u8::is_ascii_whitespace) {
        SearchQuery::default()
    } else {
        parse_json_body(&req_id.0, &body)?
    };

    let report = state.search.run(&query).await;

    match report.outcome {
        SearchOutcome::Found => Ok(Json(ApiResponse::new(req_id.0, report))),
        SearchOutcome::NoData => Err(ApiError::new(
            req_id.0,
            "no_data",
            "No properties found. Please try again with different search parameters.",
        )
        .with_details(&report)),
        SearchOutcome::NoMatchesInRange => Err(ApiError::new(
            req_id.0,
            "no_matches_in_range",
            "No properties found in the specified price range.",
        )
        .with_details(&report)),
    }
}
