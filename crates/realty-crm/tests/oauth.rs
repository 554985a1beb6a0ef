//! Integration tests for `OAuthService` against a wiremock token endpoint.

use realty_crm::{CrmError, OAuthProvider, OAuthService};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(server: &MockServer) -> OAuthProvider {
    OAuthProvider {
        name: "gohighlevel".to_string(),
        client_id: Some("client-123".to_string()),
        client_secret: Some("secret-456".to_string()),
        redirect_uri: "http://localhost:3000/api/auth/callback".to_string(),
        scope: "contacts/readonly".to_string(),
        authorize_url: format!("{}/oauth/chooselocation", server.uri()),
        token_url: format!("{}/oauth/token", server.uri()),
        userinfo_url: format!("{}/oauth/userinfo", server.uri()),
    }
}

fn service(server: &MockServer) -> OAuthService {
    OAuthService::new(provider(server), 5).expect("service construction should not fail")
}

#[tokio::test]
async fn exchange_code_posts_form_and_parses_tokens() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=auth-code-1"))
        .and(body_string_contains("client_id=client-123"))
        .and(body_string_contains("client_secret=secret-456"))
        .and(body_string_contains(
            "redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fapi%2Fauth%2Fcallback",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at-1",
            "refresh_token": "rt-1",
            "expires_in": 86399,
            "token_type": "Bearer",
            "locationId": "loc_1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = service(&server).exchange_code("auth-code-1").await.unwrap();

    assert_eq!(tokens.access_token, "at-1");
    assert_eq!(tokens.refresh_token.as_deref(), Some("rt-1"));
    assert_eq!(tokens.expires_in, Some(86_399));
    assert_eq!(tokens.location_id.as_deref(), Some("loc_1"));
}

#[tokio::test]
async fn refresh_uses_refresh_token_grant() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=rt-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at-2",
            "refresh_token": "rt-2",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = service(&server).refresh("rt-1").await.unwrap();

    assert_eq!(tokens.access_token, "at-2");
    assert_eq!(tokens.refresh_token.as_deref(), Some("rt-2"));
}

#[tokio::test]
async fn rejected_code_is_an_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid authorization code"
        })))
        .mount(&server)
        .await;

    let err = service(&server).exchange_code("stale").await.unwrap_err();

    assert!(
        matches!(err, CrmError::Api { status: 400, ref message } if message.contains("invalid_grant")),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn token_response_without_access_token_is_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token_type": "Bearer" })))
        .mount(&server)
        .await;

    let err = service(&server).refresh("rt-1").await.unwrap_err();

    assert!(matches!(err, CrmError::Deserialize { .. }), "got: {err:?}");
}

#[tokio::test]
async fn fetch_user_sends_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/oauth/userinfo"))
        .and(header("authorization", "Bearer at-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sub": 4242,
            "name": "Dana Agent",
            "email": "dana@example.com"
        })))
        .mount(&server)
        .await;

    let user = service(&server).fetch_user("at-1").await.unwrap();

    assert_eq!(user.id, "4242");
    assert_eq!(user.email.as_deref(), Some("dana@example.com"));
    assert!(user.location_id.is_none());
}

#[tokio::test]
async fn exchange_without_secret_never_calls_provider() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut provider = provider(&server);
    provider.client_secret = None;
    let service = OAuthService::new(provider, 5).unwrap();

    let err = service.exchange_code("code").await.unwrap_err();

    assert!(matches!(err, CrmError::MissingCredential("client secret")));
    server.verify().await;
}
