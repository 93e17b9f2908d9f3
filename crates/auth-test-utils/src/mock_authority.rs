//! Wiremock-backed authority for tests.
//!
//! Serves the authority's HTTP endpoints with the `{code, msg, data}`
//! envelope.
//!
//! # Example
//!
//! ```rust,ignore
//! let authority = MockAuthority::start().await;
//! authority.mount_healthy().await;
//! authority.mount_token("client-token", 3600).await;
//! authority.mount_public_keys(&[primary_key_entry()]).await;
//!
//! let config = ClientConfig::new(authority.uri(), "app-1", "secret".into());
//! ```

use auth_client::authority::PublicKeyEntry;
use chrono::Utc;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Envelope with `code = 0`.
pub fn ok_envelope(data: Value) -> Value {
    json!({"code": 0, "msg": "ok", "data": data})
}

/// Envelope with a non-zero `code` and no data.
pub fn error_envelope(code: i64, msg: &str) -> Value {
    json!({"code": code, "msg": msg, "data": null})
}

/// Mock authority HTTP API.
pub struct MockAuthority {
    server: MockServer,
}

impl MockAuthority {
    /// Start an empty mock server.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL of the mock.
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// The underlying server, for custom mounts.
    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// `GET /health` returns 200.
    pub async fn mount_healthy(&self) {
        self.mount_health_status(200).await;
    }

    /// `GET /health` returns `status`.
    pub async fn mount_health_status(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// `POST /token` issues `token` expiring `expires_in` seconds from now.
    pub async fn mount_token(&self, token: &str, expires_in: i64) {
        let expires_at = Utc::now().timestamp() + expires_in;
        self.mount_token_response(
            200,
            ok_envelope(json!({"token": token, "expiresAt": expires_at})),
        )
        .await;
    }

    /// `POST /token` returns `body` with `status`.
    pub async fn mount_token_response(&self, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// `GET /public-key` returns `entries`.
    pub async fn mount_public_keys(&self, entries: &[PublicKeyEntry]) {
        let data: Vec<Value> = entries
            .iter()
            .map(|e| json!({"kid": e.kid, "alg": e.alg, "use": e.key_use, "pem": e.pem}))
            .collect();
        self.mount_public_keys_response(200, ok_envelope(Value::Array(data)))
            .await;
    }

    /// `GET /public-key` returns `body` with `status`.
    pub async fn mount_public_keys_response(&self, status: u16, body: Value) {
        Mock::given(method("GET"))
            .and(path("/public-key"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// `GET /user/read/{id}` returns `user`.
    pub async fn mount_user(&self, id: u64, user: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/user/read/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(user)))
            .mount(&self.server)
            .await;
    }

    /// Drop every mount and the request log.
    pub async fn reset_mounts(&self) {
        self.server.reset().await;
    }

    /// Number of requests received for `request_path`.
    pub async fn request_count(&self, request_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == request_path)
            .count()
    }
}
