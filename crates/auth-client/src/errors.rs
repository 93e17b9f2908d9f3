//! Error types for the auth client.
//!
//! Infrastructure failures (authority HTTP calls, policy cache reads) and
//! credential failures (token verification, permission checks) are kept in
//! separate types: the former may be retried by whoever scheduled the work,
//! the latter never are.
//!
//! `Rejection` is the only type that reaches an HTTP client. It maps to
//! 401/403 with a generic message; the specific reason is logged server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failure talking to the authority HTTP API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthorityError {
    #[error("Authority request failed: {0}")]
    Http(String),

    #[error("Authority request timed out")]
    Timeout,

    #[error("Authority returned status {0}")]
    Status(u16),

    #[error("Invalid authority response: {0}")]
    InvalidResponse(String),

    #[error("Authority rejected request (code {code}): {msg}")]
    Rejected { code: i64, msg: String },

    #[error("Authority returned an empty key set")]
    EmptyKeySet,
}

impl From<reqwest::Error> for AuthorityError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AuthorityError::Timeout
        } else if err.is_decode() {
            AuthorityError::InvalidResponse(err.to_string())
        } else {
            AuthorityError::Http(err.to_string())
        }
    }
}

/// Fetching the public key set failed.
pub type KeyFetchError = AuthorityError;

/// Fetching this client's access token failed.
pub type TokenFetchError = AuthorityError;

/// A key entry in a replacement set could not be turned into a verification key.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Failed to parse key material (kid={kid}): {reason}")]
pub struct KeyParseError {
    pub kid: String,
    pub reason: String,
}

/// A key refresh failed; the previous snapshot stays installed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyRefreshError {
    #[error("Key fetch failed: {0}")]
    Fetch(#[from] KeyFetchError),

    #[error(transparent)]
    Parse(#[from] KeyParseError),
}

/// Token verification failure, one variant per verification step.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq, Hash)]
pub enum VerifyError {
    #[error("Token is malformed")]
    Malformed,

    #[error("Token uses an unsupported signing algorithm")]
    UnsupportedAlgorithm,

    #[error("Token header has no key identifier")]
    MissingKeyId,

    #[error("Token key identifier is not in the current key set")]
    UnknownKeyId,

    #[error("Token signature is invalid")]
    BadSignature,

    /// Past `exp`, or before a present `nbf`.
    #[error("Token is expired or not yet valid")]
    Expired,
}

impl VerifyError {
    /// Machine-readable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            VerifyError::Malformed => "malformed",
            VerifyError::UnsupportedAlgorithm => "unsupported_algorithm",
            VerifyError::MissingKeyId => "missing_kid",
            VerifyError::UnknownKeyId => "unknown_kid",
            VerifyError::BadSignature => "bad_signature",
            VerifyError::Expired => "expired",
        }
    }
}

/// Policy cache read failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("No policy entry for key {0}")]
    NotFound(String),

    #[error("Policy cache unavailable: {0}")]
    Backend(String),

    #[error("Policy entry could not be decoded: {0}")]
    Deserialize(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Backend(err.to_string())
    }
}

/// Client bootstrap failure. Any of these aborts initialisation.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("Authority health check failed: {0}")]
    Health(AuthorityError),

    #[error("Initial client token acquisition failed: {0}")]
    Token(TokenFetchError),

    #[error("Initial key load failed: {0}")]
    Keys(KeyRefreshError),

    #[error("Policy cache connection failed: {0}")]
    PolicyCache(CacheError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Failure calling the authority's user API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UserApiError {
    #[error("Client token unavailable: {0}")]
    Token(TokenFetchError),

    #[error("User request failed: {0}")]
    Request(AuthorityError),
}

/// Why the authorization gate turned a request away.
///
/// Maps to HTTP status codes:
/// - MissingHeader, InvalidHeaderFormat, InvalidToken, UnknownSubjectType: 401
/// - PermissionDenied, PolicyUnavailable: 403
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("Missing Authorization header")]
    MissingHeader,

    #[error("Invalid Authorization header format")]
    InvalidHeaderFormat,

    #[error("Invalid token: {0}")]
    InvalidToken(VerifyError),

    #[error("Unknown subject type")]
    UnknownSubjectType,

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Policy lookup failed: {0}")]
    PolicyUnavailable(CacheError),
}

impl Rejection {
    /// Returns the HTTP status code for this rejection.
    pub fn status_code(&self) -> u16 {
        match self {
            Rejection::MissingHeader
            | Rejection::InvalidHeaderFormat
            | Rejection::InvalidToken(_)
            | Rejection::UnknownSubjectType => 401,
            Rejection::PermissionDenied | Rejection::PolicyUnavailable(_) => 403,
        }
    }

    /// Machine-readable reason for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::MissingHeader => "missing_header",
            Rejection::InvalidHeaderFormat => "invalid_header_format",
            Rejection::InvalidToken(_) => "invalid_token",
            Rejection::UnknownSubjectType => "unknown_subject_type",
            Rejection::PermissionDenied => "permission_denied",
            Rejection::PolicyUnavailable(_) => "policy_unavailable",
        }
    }

    /// Message returned to the caller. Never names the failed check.
    pub fn public_message(&self) -> &'static str {
        match self {
            Rejection::MissingHeader => "missing authorization header",
            Rejection::InvalidHeaderFormat => "invalid authorization header format",
            Rejection::InvalidToken(_) | Rejection::UnknownSubjectType => "not logged in",
            Rejection::PermissionDenied | Rejection::PolicyUnavailable(_) => "permission denied",
        }
    }
}

#[derive(Serialize)]
struct RejectionBody {
    code: u16,
    msg: &'static str,
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::UNAUTHORIZED);

        let body = RejectionBody {
            code: status.as_u16(),
            msg: self.public_message(),
        };

        let mut response = (status, Json(body)).into_response();

        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = "Bearer error=\"invalid_token\"".parse() {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}
