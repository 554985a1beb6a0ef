use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use realty_core::builtin_fallback_listings;
use realty_crm::{CrmClient, OAuthProvider, OAuthService};
use realty_listings::{ListingSearch, PollBudget};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

const USER_COOKIE: &str =
    "user={%22id%22:%2242%22,%22name%22:%22Dana%22,%22locationId%22:%22loc_1%22}";

fn provider(base: &str, client_id: Option<&str>) -> OAuthProvider {
    OAuthProvider {
        name: "gohighlevel".to_string(),
        client_id: client_id.map(str::to_string),
        client_secret: Some("secret-456".to_string()),
        redirect_uri: "http://localhost:3000/api/auth/callback".to_string(),
        scope: "contacts/readonly".to_string(),
        authorize_url: format!("{base}/oauth/chooselocation"),
        token_url: format!("{base}/oauth/token"),
        userinfo_url: format!("{base}/oauth/userinfo"),
    }
}

fn state_with(base: &str, client_id: Option<&str>) -> AppState {
    AppState {
        oauth: Arc::new(OAuthService::new(provider(base, client_id), 5).expect("oauth")),
        crm: Arc::new(
            CrmClient::with_base_url(base, "2023-07-01", 5)
                .expect("crm")
                .with_retry_policy(0, 0),
        ),
        search: Arc::new(ListingSearch::new(
            None,
            builtin_fallback_listings().expect("fallback"),
            PollBudget::default(),
            3,
        )),
        cookies: CookiePolicy::new(false),
    }
}

fn app_for(base: &str) -> Router {
    build_app(state_with(base, Some("client-123")), default_rate_limit_state())
}

fn offline_app() -> Router {
    app_for("http://127.0.0.1:9")
}

fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).expect("request")
}

fn post_request(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_owned())).expect("request")
}

async fn read_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    serde_json::from_slice(&bytes).expect("json parse")
}

fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().expect("ascii cookie").to_string())
        .collect()
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .expect("location header")
}

#[test]
fn api_error_codes_map_to_statuses() {
    let cases = [
        ("no_data", StatusCode::NOT_FOUND),
        ("no_matches_in_range", StatusCode::NOT_FOUND),
        ("unauthorized", StatusCode::UNAUTHORIZED),
        ("validation_error", StatusCode::BAD_REQUEST),
        ("upstream_error", StatusCode::BAD_GATEWAY),
        ("internal_error", StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (code, status) in cases {
        let response = ApiError::new("req-1", code, "x").into_response();
        assert_eq!(response.status(), status, "code: {code}");
    }
}

#[tokio::test]
async fn health_reports_fallback_mode() {
    let response = offline_app()
        .oneshot(get_request("/api/v1/health", None))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let json = read_json(response).await;
    assert_eq!(json["data"]["status"], "ok");
    assert_eq!(json["data"]["listings"], "fallback");
}

// ---------------------------------------------------------------------------
// Listing search
// ---------------------------------------------------------------------------

#[tokio::test]
async fn search_with_empty_body_serves_fallback_listings() {
    let response = offline_app()
        .oneshot(post_request("/api/zillow-search", "", None))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert_eq!(json["data"]["outcome"], "found");
    assert_eq!(json["data"]["used_fallback"], true);
    assert_eq!(json["data"]["total_matched"], 3);
    assert_eq!(json["data"]["records"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn search_alias_applies_price_range() {
    let response = offline_app()
        .oneshot(post_request(
            "/api/v1/listings/search",
            r#"{"location":"Miami Beach, FL","minPrice":800000,"maxPrice":900000}"#,
            None,
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert_eq!(json["data"]["total_matched"], 1);
    assert_eq!(json["data"]["records"][0]["id"], "234567");
}

#[tokio::test]
async fn search_with_no_matches_is_404() {
    let response = offline_app()
        .oneshot(post_request(
            "/api/zillow-search",
            r#"{"minPrice":2000000}"#,
            None,
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = read_json(response).await;
    assert_eq!(json["error"]["code"], "no_matches_in_range");
    let details = &json["error"]["details"];
    assert_eq!(details["outcome"], "no_matches_in_range");
    assert_eq!(details["used_fallback"], true);
    assert_eq!(details["total_matched"], 0);
    assert!(details["elapsed_ms"].is_u64());
    assert_eq!(details["records"], json!([]));
}

#[tokio::test]
async fn search_with_inverted_range_reports_no_matches() {
    let response = offline_app()
        .oneshot(post_request(
            "/api/zillow-search",
            r#"{"minPrice":900000,"maxPrice":100}"#,
            None,
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = read_json(response).await;
    assert_eq!(json["error"]["code"], "no_matches_in_range");
    assert_eq!(json["error"]["details"]["used_fallback"], true);
}

#[tokio::test]
async fn search_rejects_malformed_body() {
    let malformed = offline_app()
        .oneshot(post_request("/api/zillow-search", "{not json", None))
        .await
        .expect("response");
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
    let json = read_json(malformed).await;
    assert_eq!(json["error"]["code"], "bad_request");
    assert!(json["error"].get("details").is_none());
}

// ---------------------------------------------------------------------------
// Session endpoints
// ---------------------------------------------------------------------------

#[tokio::test]
async fn session_without_cookies_reports_null_user() {
    let response = offline_app()
        .oneshot(get_request("/api/auth/session", None))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert!(json["data"]["user"].is_null());
    assert!(json["data"].get("expires").is_none());
}

#[tokio::test]
async fn session_reads_legacy_cookie_names() {
    let cookie = format!("ghl_access_token=at-1; ghl_{USER_COOKIE}");
    let response = offline_app()
        .oneshot(get_request("/api/auth/session", Some(&cookie)))
        .await
        .expect("response");

    let json = read_json(response).await;
    assert_eq!(json["data"]["user"]["id"], "42");
    assert_eq!(json["data"]["user"]["locationId"], "loc_1");
    assert!(json["data"]["expires"].is_string());
}

#[tokio::test]
async fn user_endpoint_requires_a_session() {
    let app = offline_app();

    let anonymous = app
        .clone()
        .oneshot(get_request("/api/auth/user", None))
        .await
        .expect("response");
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let cookie = format!("access_token=at-1; {USER_COOKIE}");
    let signed_in = app
        .oneshot(get_request("/api/auth/user", Some(&cookie)))
        .await
        .expect("response");
    assert_eq!(signed_in.status(), StatusCode::OK);
    let json = read_json(signed_in).await;
    assert_eq!(json["data"]["access_token"], "at-1");
    assert_eq!(json["data"]["user"]["name"], "Dana");
}

#[tokio::test]
async fn sign_out_get_clears_cookies_and_redirects_home() {
    let response = offline_app()
        .oneshot(get_request("/api/auth/signout", Some("access_token=at-1")))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/");
    let cookies = set_cookies(&response);
    assert!(cookies.iter().any(|c| c.starts_with("access_token=; Path=/; Max-Age=0")));
    assert!(cookies.iter().any(|c| c.starts_with("ghl_user=; Path=/; Max-Age=0")));
}

// ---------------------------------------------------------------------------
// OAuth flow
// ---------------------------------------------------------------------------

#[tokio::test]
async fn login_redirects_to_provider_with_state_cookie() {
    let response = offline_app()
        .oneshot(get_request("/api/auth/gohighlevel", None))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let target = location(&response).to_string();
    assert!(target.starts_with(
        "http://127.0.0.1:9/oauth/chooselocation?response_type=code&client_id=client-123"
    ));
    let state = target
        .split("state=")
        .nth(1)
        .expect("state parameter")
        .to_string();
    assert!(set_cookies(&response)
        .iter()
        .any(|c| c.starts_with(&format!("oauth_state={state}; Path=/; Max-Age=600"))));
}

#[tokio::test]
async fn login_without_client_id_redirects_with_error() {
    let app = build_app(
        state_with("http://127.0.0.1:9", None),
        default_rate_limit_state(),
    );
    let response = app
        .oneshot(get_request("/api/auth/gohighlevel", None))
        .await
        .expect("response");

    assert_eq!(
        location(&response),
        "/?error=Missing+GoHighLevel+client+ID"
    );
}

#[tokio::test]
async fn callback_without_code_redirects_with_error() {
    let response = offline_app()
        .oneshot(get_request("/api/auth/callback", None))
        .await
        .expect("response");

    assert_eq!(location(&response), "/?error=No+authorization+code+provided");
}

#[tokio::test]
async fn callback_rejects_mismatched_state() {
    let response = offline_app()
        .oneshot(get_request(
            "/api/auth/callback?code=abc&state=forged",
            Some("oauth_state=expected"),
        ))
        .await
        .expect("response");

    assert_eq!(location(&response), "/?error=Invalid+OAuth+state");
}

#[tokio::test]
async fn callback_rejects_state_without_cookie() {
    let response = offline_app()
        .oneshot(get_request("/api/auth/callback?code=abc&state=forged", None))
        .await
        .expect("response");

    assert_eq!(location(&response), "/?error=Invalid+OAuth+state");
}

#[tokio::test]
async fn callback_passes_provider_error_home() {
    let app = offline_app();

    let described = app
        .clone()
        .oneshot(get_request(
            "/api/auth/callback?error=access_denied&error_description=User+denied+access",
            None,
        ))
        .await
        .expect("response");
    assert_eq!(location(&described), "/?error=User%20denied%20access");
    assert!(set_cookies(&described)
        .iter()
        .any(|c| c.starts_with("oauth_state=; Path=/; Max-Age=0")));

    let bare = app
        .oneshot(get_request("/api/auth/callback?error=access_denied&code=abc", None))
        .await
        .expect("response");
    assert_eq!(location(&bare), "/?error=access%5Fdenied");
}

#[tokio::test]
async fn callback_completes_login_and_stores_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("code=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at-1",
            "refresh_token": "rt-1",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oauth/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 42,
            "name": "Dana",
            "locationId": "loc_1"
        })))
        .mount(&server)
        .await;

    let response = app_for(&server.uri())
        .oneshot(get_request(
            "/api/auth/callback/gohighlevel?code=abc&state=s1",
            Some("oauth_state=s1"),
        ))
        .await
        .expect("response");

    assert_eq!(location(&response), "/dashboard");
    let cookies = set_cookies(&response);
    assert!(cookies.iter().any(|c| c.starts_with("access_token=at-1; Path=/; Max-Age=3600")));
    assert!(cookies.iter().any(|c| c.starts_with("refresh_token=rt-1;")));
    assert!(cookies.iter().any(|c| c.starts_with("user=")));
    assert!(cookies.iter().any(|c| c.starts_with("oauth_state=; Path=/; Max-Age=0")));
}

#[tokio::test]
async fn callback_sends_users_without_location_to_onboarding() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "at-1" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oauth/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sub": "u_1" })))
        .mount(&server)
        .await;

    let response = app_for(&server.uri())
        .oneshot(get_request("/api/auth/gohighlevel/callback?code=abc", None))
        .await
        .expect("response");

    assert_eq!(location(&response), "/onboarding");
}

#[tokio::test]
async fn callback_falls_back_to_query_location() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "at-1" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oauth/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sub": "u_1" })))
        .mount(&server)
        .await;

    let response = app_for(&server.uri())
        .oneshot(get_request(
            "/api/auth/callback?code=abc&locationId=loc_9",
            None,
        ))
        .await
        .expect("response");

    assert_eq!(location(&response), "/dashboard");
    assert!(set_cookies(&response)
        .iter()
        .any(|c| c.starts_with("user=") && c.contains("loc_9")));
}

#[tokio::test]
async fn failed_refresh_clears_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
        .mount(&server)
        .await;

    let response = app_for(&server.uri())
        .oneshot(post_request("/api/auth/refresh", "", Some("refresh_token=rt-old")))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let cookies = set_cookies(&response);
    assert!(cookies.iter().any(|c| c.starts_with("refresh_token=; Path=/; Max-Age=0")));
}

#[tokio::test]
async fn refresh_keeps_stored_location_when_profile_lacks_one() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("refresh_token=rt-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at-2",
            "expires_in": 7200
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oauth/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "42" })))
        .mount(&server)
        .await;

    let cookie = format!("refresh_token=rt-1; {USER_COOKIE}");
    let response = app_for(&server.uri())
        .oneshot(post_request("/api/auth/refresh", "", Some(&cookie)))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookies(&response);
    assert!(cookies.iter().any(|c| c.starts_with("access_token=at-2; Path=/; Max-Age=7200")));
    let user_cookie = cookies
        .iter()
        .find(|c| c.starts_with("user="))
        .expect("user cookie");
    assert!(user_cookie.contains("loc_1"));
}

// ---------------------------------------------------------------------------
// CRM proxy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn crm_routes_require_a_session() {
    let response = offline_app()
        .oneshot(get_request("/api/v1/crm/locations", None))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn crm_proxy_refreshes_a_rejected_token_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/locations/v1"))
        .and(wiremock::matchers::header("authorization", "Bearer expired"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid JWT"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/locations/v1"))
        .and(wiremock::matchers::header("authorization", "Bearer at-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "locations": [{ "id": "loc_1", "name": "Miami Office" }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at-2",
            "refresh_token": "rt-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = app_for(&server.uri())
        .oneshot(get_request(
            "/api/v1/crm/locations",
            Some("access_token=expired; refresh_token=rt-1"),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookies(&response);
    assert!(cookies.iter().any(|c| c.starts_with("access_token=at-2;")));
    assert!(cookies.iter().any(|c| c.starts_with("refresh_token=rt-2;")));
    let json = read_json(response).await;
    assert_eq!(json["data"][0]["id"], "loc_1");
}

#[tokio::test]
async fn crm_rejection_without_refresh_token_is_401() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/locations/v1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let response = app_for(&server.uri())
        .oneshot(get_request("/api/v1/crm/locations", Some("access_token=expired")))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(response).await["error"]["code"], "unauthorized");
}

#[tokio::test]
async fn contacts_default_to_the_session_location() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/contacts/v1"))
        .and(query_param("locationId", "loc_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "contacts": [{ "id": "c_1", "firstName": "Ada" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cookie = format!("access_token=at-1; {USER_COOKIE}");
    let response = app_for(&server.uri())
        .oneshot(get_request("/api/v1/crm/contacts", Some(&cookie)))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["data"][0]["firstName"], "Ada");
}

#[tokio::test]
async fn pipelines_without_any_location_are_rejected() {
    let response = offline_app()
        .oneshot(get_request("/api/v1/crm/pipelines", Some("access_token=at-1")))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upstream_failure_maps_to_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/opportunities/v1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let response = app_for(&server.uri())
        .oneshot(get_request(
            "/api/v1/crm/opportunities?pipeline_id=p_1",
            Some("access_token=at-1"),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn create_opportunity_returns_201() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/opportunities/v1"))
        .and(body_string_contains("\"locationId\":\"loc_1\""))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "opportunity": { "id": "o_1", "name": "222 Coral Way", "pipelineId": "p_1" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cookie = format!("access_token=at-1; {USER_COOKIE}");
    let response = app_for(&server.uri())
        .oneshot(post_request(
            "/api/v1/crm/opportunities",
            r#"{"name":"222 Coral Way","pipelineId":"p_1","monetaryValue":725000}"#,
            Some(&cookie),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(read_json(response).await["data"]["id"], "o_1");
}
