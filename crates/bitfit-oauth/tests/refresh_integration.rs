//! Integration tests for the refresh grant and the authorizing transport,
//! with wiremock standing in for both the token endpoint and the API.

use std::sync::Arc;
use std::time::Duration;

use bitfit_oauth::{
    ApiClient, Authorizer, ClientCredentials, Connection, FileTokenStore, MemoryTokenStore,
    OAuth2Refresher, OAuthError, TokenManager, TokenManagerOptions, TokenRecord, TokenRefresher,
    TokenStore,
};
use chrono::{NaiveDate, TimeDelta, Utc};
use tempfile::tempdir;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// base64("id:secret")
const BASIC_ID_SECRET: &str = "Basic aWQ6c2VjcmV0";

fn credentials() -> ClientCredentials {
    ClientCredentials::new("id", "secret")
}

fn token_response(access: &str, refresh: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "access_token": access,
        "refresh_token": refresh,
        "expires_in": 28800,
        "scope": "sleep profile",
        "token_type": "Bearer",
        "user_id": "ABC123"
    }))
}

fn write_tokens(dir: &std::path::Path, expiration: chrono::DateTime<Utc>) -> std::path::PathBuf {
    let path = dir.join("tokens.json");
    let json = serde_json::json!({
        "Access": "foo",
        "Refresh": "bar",
        "Expiration": expiration.to_rfc3339(),
    });
    std::fs::write(&path, serde_json::to_string_pretty(&json).unwrap()).unwrap();
    path
}

// ─────────────────────────────────────────────────────────────────────────────
// OAuth2Refresher
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_refresh_sends_basic_auth_and_form_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(header("authorization", BASIC_ID_SECRET))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("grant_type=refresh_token&refresh_token=bar"))
        .respond_with(token_response("new-access", "new-refresh"))
        .expect(1)
        .mount(&server)
        .await;

    let refresher = OAuth2Refresher::new(reqwest::Client::new(), &server.uri());
    let before = Utc::now();
    let record = refresher.refresh(&credentials(), "bar").await.unwrap();

    assert_eq!(record.access, "new-access");
    assert_eq!(record.refresh, "new-refresh");
    assert!(record.expiration >= before + TimeDelta::seconds(28800));
    assert!(record.expiration <= Utc::now() + TimeDelta::seconds(28800));
}

#[tokio::test]
async fn test_refresh_surfaces_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "errors": [{
                "errorType": "invalid_grant",
                "message": "Refresh token invalid: bar. Visit https://dev.fitbit.com/docs/oauth2 for more information on the Fitbit Web API authorization process."
            }],
            "success": false
        })))
        .mount(&server)
        .await;

    let refresher = OAuth2Refresher::new(reqwest::Client::new(), &server.uri());
    let err = refresher.refresh(&credentials(), "bar").await.unwrap_err();

    assert!(err.requires_reauthorization());
    assert!(err.to_string().contains("Refresh token invalid: bar"));
}

#[tokio::test]
async fn test_refresh_malformed_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&server)
        .await;

    let refresher = OAuth2Refresher::new(reqwest::Client::new(), &server.uri());
    match refresher.refresh(&credentials(), "bar").await {
        Err(OAuthError::Decode(msg)) => assert!(msg.contains("502")),
        other => panic!("expected decode error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_refresh_unreachable_endpoint_is_network_error() {
    // Bind and drop to get a port nothing listens on.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let refresher = OAuth2Refresher::new(
        reqwest::Client::new(),
        &format!("http://127.0.0.1:{}", port),
    );
    assert!(matches!(
        refresher.refresh(&credentials(), "bar").await,
        Err(OAuthError::Network(_))
    ));
}

#[tokio::test]
async fn test_full_payload_is_available_raw() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(token_response("a", "r"))
        .mount(&server)
        .await;

    let refresher = OAuth2Refresher::new(reqwest::Client::new(), &server.uri());
    let (status, body) = refresher
        .fetch_token_payload(&credentials(), "bar")
        .await
        .unwrap();

    assert!(status.is_success());
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["user_id"], "ABC123");
}

// ─────────────────────────────────────────────────────────────────────────────
// ApiClient over a token file
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_fresh_file_tokens_are_used_without_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(token_response("unused", "unused"))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/1/user/-/profile.json"))
        .and(header("authorization", "Bearer foo"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"user":{"displayName":"A","age":30}}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let temp = tempdir().unwrap();
    let tokens_file = write_tokens(temp.path(), Utc::now() + TimeDelta::hours(1));

    let client = ApiClient::connect(
        &server.uri(),
        Connection::Direct {
            credentials: credentials(),
            tokens_file,
            initial_refresh_token: None,
        },
        Duration::from_secs(5),
    )
    .await
    .unwrap();

    let response = client.fetch_profile().await.unwrap();
    assert!(response.is_success());
    assert_eq!(
        response.body,
        "{\n    \"user\": {\n        \"displayName\": \"A\",\n        \"age\": 30\n    }\n}"
    );
}

#[tokio::test]
async fn test_expired_file_tokens_refresh_once_during_connect() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string("grant_type=refresh_token&refresh_token=bar"))
        .respond_with(token_response("new-access", "new-refresh"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/1.2/user/-/sleep/date/2019-09-16.json"))
        .and(header("authorization", "Bearer new-access"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"sleep":[],"summary":{}}"#))
        .expect(1)
        .mount(&server)
        .await;

    let temp = tempdir().unwrap();
    let tokens_file = write_tokens(temp.path(), Utc::now() - TimeDelta::minutes(1));

    let client = ApiClient::connect(
        &server.uri(),
        Connection::Direct {
            credentials: credentials(),
            tokens_file: tokens_file.clone(),
            initial_refresh_token: None,
        },
        Duration::from_secs(5),
    )
    .await
    .unwrap();

    let persisted = FileTokenStore::new(&tokens_file).load().await.unwrap();
    assert_eq!(persisted.access, "new-access");
    assert_eq!(persisted.refresh, "new-refresh");

    let date = NaiveDate::from_ymd_opt(2019, 9, 16).unwrap();
    let response = client.fetch_sleep_log(date).await.unwrap();
    assert!(response.is_success());
}

#[tokio::test]
async fn test_bootstrap_writes_tokens_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string("grant_type=refresh_token&refresh_token=initial"))
        .respond_with(token_response("first-access", "first-refresh"))
        .expect(1)
        .mount(&server)
        .await;

    let temp = tempdir().unwrap();
    let tokens_file = temp.path().join("tokens.json");

    ApiClient::connect(
        &server.uri(),
        Connection::Direct {
            credentials: credentials(),
            tokens_file: tokens_file.clone(),
            initial_refresh_token: Some("initial".to_string()),
        },
        Duration::from_secs(5),
    )
    .await
    .unwrap();

    let persisted = FileTokenStore::new(&tokens_file).load().await.unwrap();
    assert_eq!(persisted.access, "first-access");
}

#[tokio::test]
async fn test_error_status_body_passed_through_verbatim() {
    let server = MockServer::start().await;
    let raw = r#"{"errors":[{"errorType":"expired_token","message":"Access token expired"}],"success":false}"#;
    Mock::given(method("GET"))
        .and(path("/1/user/-/profile.json"))
        .respond_with(ResponseTemplate::new(401).set_body_string(raw))
        .mount(&server)
        .await;

    let client = ApiClient::new(
        &server.uri(),
        reqwest::Client::new(),
        Authorizer::proxy_basic_auth("user", "pass"),
    )
    .unwrap();

    let response = client.fetch_profile().await.unwrap();
    assert_eq!(response.status.as_u16(), 401);
    assert_eq!(response.body, raw);
}

#[tokio::test]
async fn test_proxy_basic_auth_client_never_refreshes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1/user/-/profile.json"))
        // base64("user:pass")
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::connect(
        &server.uri(),
        Connection::Proxy {
            username: "user".to_string(),
            password: "pass".to_string(),
        },
        Duration::from_secs(5),
    )
    .await
    .unwrap();

    assert_eq!(client.fetch_profile().await.unwrap().body, "{}");
}

// ─────────────────────────────────────────────────────────────────────────────
// Concurrency
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_near_expiry_requests_refresh_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(token_response("new-access", "new-refresh").set_delay(Duration::from_millis(200)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/1/user/-/profile.json"))
        .and(header("authorization", "Bearer new-access"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(50)
        .mount(&server)
        .await;

    let http = reqwest::Client::new();
    let store = Arc::new(MemoryTokenStore::with_record(TokenRecord::new(
        "foo",
        "bar",
        Utc::now() + TimeDelta::minutes(2),
    )));
    let manager = TokenManager::initialize(TokenManagerOptions::new(
        credentials(),
        store.clone(),
        Arc::new(OAuth2Refresher::new(http.clone(), &server.uri())),
    ))
    .await
    .unwrap();

    let client = ApiClient::new(&server.uri(), http, Authorizer::DirectOAuth2(manager)).unwrap();

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.fetch_profile().await })
        })
        .collect();

    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        assert!(response.is_success());
    }

    assert_eq!(store.save_count(), 1);
    assert_eq!(store.current().await.unwrap().access, "new-access");
}

#[tokio::test]
async fn test_cancelled_caller_does_not_abort_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(token_response("new-access", "new-refresh").set_delay(Duration::from_millis(300)))
        .expect(1)
        .mount(&server)
        .await;

    let http = reqwest::Client::new();
    let store = Arc::new(MemoryTokenStore::with_record(TokenRecord::new(
        "foo",
        "bar",
        Utc::now() + TimeDelta::minutes(2),
    )));
    let manager = TokenManager::initialize(TokenManagerOptions::new(
        credentials(),
        store.clone(),
        Arc::new(OAuth2Refresher::new(http, &server.uri())),
    ))
    .await
    .unwrap();

    // Give up long before the token endpoint answers.
    let result = tokio::time::timeout(Duration::from_millis(50), manager.access_token()).await;
    assert!(result.is_err());

    // The refresh keeps running and lands in the store.
    for _ in 0..50 {
        if store.save_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(store.save_count(), 1);
    assert_eq!(manager.access_token().await.unwrap(), "new-access");
}
