//! Auth client bootstrap and refresh tests against a mocked authority.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use auth_client::errors::{AuthorityError, InitError, KeyRefreshError, UserApiError};
use auth_client::gate::{Decision, Identity};
use auth_client::{AuthClient, ClientConfig, ClientOptions, KeyRefreshMode};
use auth_test_utils::*;
use axum::http::{header::AUTHORIZATION, HeaderMap, HeaderValue};
use common::secret::{ExposeSecret, SecretString};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn config(authority: &MockAuthority) -> ClientConfig {
    ClientConfig::new(authority.uri(), "app-1", SecretString::from("secret"))
        .with_http_timeout(Duration::from_secs(5))
}

fn external() -> ClientOptions {
    ClientOptions::default().with_key_refresh(KeyRefreshMode::External)
}

async fn healthy_authority() -> MockAuthority {
    let authority = MockAuthority::start().await;
    authority.mount_healthy().await;
    authority.mount_token("client-token", 3600).await;
    authority.mount_public_keys(&[primary_key_entry()]).await;
    authority
}

async fn connect(
    authority: &MockAuthority,
    policies: MockPolicyStore,
) -> Result<AuthClient, InitError> {
    AuthClient::connect(config(authority), external(), Arc::new(policies)).await
}

#[tokio::test]
async fn test_connect_populates_token_and_keys() {
    let authority = healthy_authority().await;
    let client = connect(&authority, MockPolicyStore::new()).await.unwrap();

    assert!(client.key_store().lookup(PRIMARY_KID).await.is_some());
    assert_eq!(
        client.client_token().await.unwrap().expose_secret(),
        "client-token"
    );
    assert_eq!(authority.request_count("/health").await, 1);
    assert_eq!(authority.request_count("/token").await, 1);
    assert_eq!(authority.request_count("/public-key").await, 1);
}

#[tokio::test]
async fn test_connected_gate_authorizes_requests() {
    let authority = healthy_authority().await;
    let client = connect(
        &authority,
        MockPolicyStore::new().with_user_patterns(42, &["/orders/*"]),
    )
    .await
    .unwrap();

    let token = TestTokenBuilder::new().for_user(42).build();
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    );

    assert_eq!(
        client.gate().authorize(&headers, "/orders/5").await,
        Decision::Allow(Identity::User(42))
    );
}

#[tokio::test]
async fn test_unhealthy_authority_aborts_before_token() {
    let authority = MockAuthority::start().await;
    authority.mount_health_status(503).await;
    authority.mount_token("client-token", 3600).await;

    let err = connect(&authority, MockPolicyStore::new()).await.err().unwrap();

    assert!(matches!(err, InitError::Health(AuthorityError::Status(503))));
    assert_eq!(authority.request_count("/token").await, 0);
}

#[tokio::test]
async fn test_token_failure_aborts_before_keys() {
    let authority = MockAuthority::start().await;
    authority.mount_healthy().await;
    authority
        .mount_token_response(200, error_envelope(4010, "invalid secret"))
        .await;
    authority.mount_public_keys(&[primary_key_entry()]).await;

    let err = connect(&authority, MockPolicyStore::new()).await.err().unwrap();

    assert!(matches!(err, InitError::Token(AuthorityError::Rejected { code: 4010, .. })));
    assert_eq!(authority.request_count("/public-key").await, 0);
}

#[tokio::test]
async fn test_key_fetch_failure_aborts() {
    let authority = MockAuthority::start().await;
    authority.mount_healthy().await;
    authority.mount_token("client-token", 3600).await;
    authority
        .mount_public_keys_response(200, json!({"code": 0, "msg": "ok", "data": []}))
        .await;

    let err = connect(&authority, MockPolicyStore::new()).await.err().unwrap();
    assert!(matches!(
        err,
        InitError::Keys(KeyRefreshError::Fetch(AuthorityError::EmptyKeySet))
    ));
}

#[tokio::test]
async fn test_key_parse_failure_aborts() {
    let authority = MockAuthority::start().await;
    authority.mount_healthy().await;
    authority.mount_token("client-token", 3600).await;
    authority
        .mount_public_keys(&[primary_key_entry(), malformed_key_entry("k3")])
        .await;

    let err = connect(&authority, MockPolicyStore::new()).await.err().unwrap();
    assert!(matches!(err, InitError::Keys(KeyRefreshError::Parse(_))));
}

#[tokio::test]
async fn test_failed_refresh_retains_previous_keys() {
    let authority = healthy_authority().await;
    let client = connect(&authority, MockPolicyStore::new()).await.unwrap();

    authority.reset_mounts().await;
    authority.mount_public_keys_response(502, json!({})).await;

    let err = client.refresh_public_keys().await.unwrap_err();
    assert_eq!(err, KeyRefreshError::Fetch(AuthorityError::Status(502)));
    assert!(client.key_store().lookup(PRIMARY_KID).await.is_some());

    authority.reset_mounts().await;
    authority
        .mount_public_keys(&[secondary_key_entry(), malformed_key_entry("k3")])
        .await;

    assert!(matches!(
        client.refresh_public_keys().await,
        Err(KeyRefreshError::Parse(_))
    ));
    assert!(client.key_store().lookup(PRIMARY_KID).await.is_some());
    assert!(client.key_store().lookup(SECONDARY_KID).await.is_none());
}

#[tokio::test]
async fn test_external_refresh_installs_rotated_keys() {
    let authority = healthy_authority().await;
    let client = connect(&authority, MockPolicyStore::new()).await.unwrap();

    authority.reset_mounts().await;
    authority.mount_public_keys(&[secondary_key_entry()]).await;

    assert_eq!(client.refresh_public_keys().await.unwrap(), 1);
    assert!(client.key_store().lookup(PRIMARY_KID).await.is_none());
    assert!(client.key_store().lookup(SECONDARY_KID).await.is_some());
}

#[tokio::test]
async fn test_user_info_uses_client_token() {
    let authority = healthy_authority().await;
    authority
        .mount_user(
            7,
            json!({
                "id": 7,
                "username": "alice",
                "name": "Alice",
                "phone": null,
                "email": null,
                "status": 0,
                "lastLoginTime": null,
                "createdAt": "2024-05-01T08:00:00Z"
            }),
        )
        .await;
    let client = connect(&authority, MockPolicyStore::new()).await.unwrap();

    let user = client.users().info(7).await.unwrap();
    assert_eq!(user.username, "alice");

    let requests = authority.server().received_requests().await.unwrap();
    let user_request = requests
        .iter()
        .find(|r| r.url.path() == "/user/read/7")
        .unwrap();
    assert_eq!(
        user_request.headers.get("authorization").unwrap(),
        "Bearer client-token"
    );
}

#[tokio::test]
async fn test_user_info_request_failure() {
    let authority = healthy_authority().await;
    let client = connect(&authority, MockPolicyStore::new()).await.unwrap();

    // No /user mount: wiremock answers 404.
    let err = client.users().info(99).await.unwrap_err();
    assert_eq!(err, UserApiError::Request(AuthorityError::Status(404)));
}

#[tokio::test]
async fn test_injected_http_client_is_used() {
    let authority = healthy_authority().await;
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();

    let client = AuthClient::connect(
        config(&authority),
        external().with_http_client(http_client),
        Arc::new(MockPolicyStore::new()),
    )
    .await
    .unwrap();

    assert!(client.key_store().lookup(PRIMARY_KID).await.is_some());
}

#[tokio::test]
async fn test_internal_refresh_task_shuts_down() {
    let authority = healthy_authority().await;
    let client = AuthClient::connect(
        config(&authority).with_key_refresh_interval(Duration::from_secs(60)),
        ClientOptions::default(),
        Arc::new(MockPolicyStore::new()),
    )
    .await
    .unwrap();

    tokio::time::timeout(Duration::from_secs(5), client.shutdown())
        .await
        .unwrap();
    // A second shutdown is a no-op.
    client.shutdown().await;
}
