//! Client for the authority's HTTP API.
//!
//! The authority wraps every JSON payload in an envelope:
//!
//! ```json
//! {"code": 0, "msg": "ok", "data": ...}
//! ```
//!
//! A non-200 status, a non-zero `code`, or a missing `data` is a failure.
//! Every call is bounded by the HTTP client's timeout; a timeout surfaces as
//! `AuthorityError::Timeout`, never as a hang.
//!
//! # Security
//!
//! - The app secret and issued tokens are held as `SecretString` and never logged
//! - HTTPS should be used in production (enforced by deployment config)

use crate::errors::{AuthorityError, KeyFetchError, TokenFetchError};
use crate::token_cache::CachedToken;
use crate::users::ApiUser;
use async_trait::async_trait;
use common::secret::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Default connection timeout for the HTTP client.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// One entry of the authority's public key list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyEntry {
    /// Key identifier.
    pub kid: String,

    /// Algorithm the key signs with (e.g. "RS256").
    #[serde(default)]
    pub alg: String,

    /// Key use (normally "sig").
    #[serde(default, rename = "use")]
    pub key_use: String,

    /// Public key in PEM format.
    pub pem: String,
}

/// Response envelope shared by all authority endpoints.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<T, AuthorityError> {
        if self.code != 0 {
            return Err(AuthorityError::Rejected {
                code: self.code,
                msg: self.msg,
            });
        }
        self.data
            .ok_or_else(|| AuthorityError::InvalidResponse("response has no data".to_string()))
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    #[serde(rename = "appId")]
    app_id: &'a str,
    secret: &'a str,
}

#[derive(Deserialize)]
struct TokenData {
    token: SecretString,
    #[serde(rename = "expiresAt")]
    expires_at: i64,
}

/// The operations this client consumes from the authority.
///
/// `HttpAuthority` is the production implementation; tests substitute their
/// own to count calls or inject failures.
#[async_trait]
pub trait AuthorityApi: Send + Sync {
    /// `GET {base}/public-key`
    async fn fetch_public_keys(&self) -> Result<Vec<PublicKeyEntry>, KeyFetchError>;

    /// `POST {base}/token`
    async fn fetch_token(
        &self,
        app_id: &str,
        secret: &SecretString,
    ) -> Result<CachedToken, TokenFetchError>;

    /// `GET {base}/health`; success iff HTTP 200.
    async fn check_health(&self) -> Result<(), AuthorityError>;

    /// `GET {base}/user/read/{id}` authenticated with this client's token.
    async fn fetch_user(&self, id: u64, bearer: &SecretString) -> Result<ApiUser, AuthorityError>;
}

/// `reqwest`-backed authority client.
#[derive(Clone)]
pub struct HttpAuthority {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAuthority {
    /// Create a client with its own `reqwest::Client` bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `AuthorityError::Http` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AuthorityError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT.min(timeout))
            .build()
            .map_err(|e| AuthorityError::Http(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self::with_client(base_url, client))
    }

    /// Use an injected `reqwest::Client`. Its timeouts are the caller's responsibility.
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Base URL requests are issued against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn read_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
        endpoint: &'static str,
    ) -> Result<T, AuthorityError> {
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            warn!(
                target: "auth.authority",
                endpoint,
                status = %status,
                "Authority returned non-200 status"
            );
            return Err(AuthorityError::Status(status.as_u16()));
        }

        let envelope: Envelope<T> = response.json().await.map_err(|e| {
            warn!(target: "auth.authority", endpoint, error = %e, "Failed to parse authority response");
            AuthorityError::InvalidResponse(e.to_string())
        })?;

        envelope.into_data().map_err(|e| {
            warn!(target: "auth.authority", endpoint, error = %e, "Authority rejected request");
            e
        })
    }
}

#[async_trait]
impl AuthorityApi for HttpAuthority {
    #[instrument(skip_all)]
    async fn fetch_public_keys(&self) -> Result<Vec<PublicKeyEntry>, KeyFetchError> {
        let url = format!("{}/public-key", self.base_url);
        debug!(target: "auth.authority", url = %url, "Fetching public keys");

        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!(target: "auth.authority", error = %e, "Public key request failed");
            AuthorityError::from(e)
        })?;

        let keys: Vec<PublicKeyEntry> = Self::read_envelope(response, "public-key").await?;
        if keys.is_empty() {
            warn!(target: "auth.authority", "Authority returned an empty key set");
            return Err(AuthorityError::EmptyKeySet);
        }

        debug!(target: "auth.authority", key_count = keys.len(), "Public keys fetched");
        Ok(keys)
    }

    #[instrument(skip_all, fields(app_id = %app_id))]
    async fn fetch_token(
        &self,
        app_id: &str,
        secret: &SecretString,
    ) -> Result<CachedToken, TokenFetchError> {
        let url = format!("{}/token", self.base_url);
        debug!(target: "auth.authority", url = %url, "Requesting client token");

        let body = TokenRequest {
            app_id,
            secret: secret.expose_secret(),
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(target: "auth.authority", error = %e, "Token request failed");
                AuthorityError::from(e)
            })?;

        let data: TokenData = Self::read_envelope(response, "token").await?;
        if data.token.expose_secret().is_empty() {
            return Err(AuthorityError::InvalidResponse(
                "token response has an empty token".to_string(),
            ));
        }

        debug!(target: "auth.authority", expires_at = data.expires_at, "Client token issued");
        Ok(CachedToken {
            value: data.token,
            expires_at: data.expires_at,
        })
    }

    #[instrument(skip_all)]
    async fn check_health(&self) -> Result<(), AuthorityError> {
        let url = format!("{}/health", self.base_url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!(target: "auth.authority", error = %e, "Health check request failed");
            AuthorityError::from(e)
        })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            warn!(target: "auth.authority", status = %status, "Health check failed");
            return Err(AuthorityError::Status(status.as_u16()));
        }

        Ok(())
    }

    #[instrument(skip_all, fields(user_id = id))]
    async fn fetch_user(&self, id: u64, bearer: &SecretString) -> Result<ApiUser, AuthorityError> {
        let url = format!("{}/user/read/{}", self.base_url, id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(bearer.expose_secret())
            .send()
            .await
            .map_err(|e| {
                warn!(target: "auth.authority", error = %e, "User request failed");
                AuthorityError::from(e)
            })?;

        Self::read_envelope(response, "user").await
    }
}
