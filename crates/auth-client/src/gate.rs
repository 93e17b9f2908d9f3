//! Request authorization gate.
//!
//! One linear pass per request, no retries:
//!
//! ```text
//! Authorization header -> bearer token -> verify -> policy lookup -> Allow
//!        |                     |            |             |
//!       401                   401          401           403
//! ```
//!
//! Every rejection carries a `Rejection` whose `reason()` is logged; callers
//! only see the generic message.

use crate::auth::claims::SubjectType;
use crate::auth::verifier::TokenVerifier;
use crate::errors::Rejection;
use crate::observability::metrics;
use crate::policy::{self, PolicyLookup};
use axum::http::{header::AUTHORIZATION, HeaderMap};
use tracing::{debug, instrument};

/// Scheme prefix of the `Authorization` header, case-sensitive.
pub const BEARER_PREFIX: &str = "Bearer ";

/// The authenticated principal of an allowed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Identity {
    /// An end user, by user id.
    User(u64),

    /// A calling application, by client id.
    Caller(u64),
}

impl Identity {
    pub fn user_id(&self) -> Option<u64> {
        match self {
            Identity::User(id) => Some(*id),
            Identity::Caller(_) => None,
        }
    }

    pub fn client_id(&self) -> Option<u64> {
        match self {
            Identity::Caller(id) => Some(*id),
            Identity::User(_) => None,
        }
    }
}

/// Outcome of [`AuthGate::authorize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow(Identity),
    Reject(Rejection),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }
}

/// Extract the bearer token from request headers.
///
/// An absent or empty header is `MissingHeader`; anything not starting with
/// `Bearer ` (including non-UTF-8 values) is `InvalidHeaderFormat`.
///
/// # Errors
///
/// Returns the header rejection.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, Rejection> {
    let value = headers
        .get(AUTHORIZATION)
        .filter(|v| !v.is_empty())
        .ok_or(Rejection::MissingHeader)?;

    value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        .ok_or(Rejection::InvalidHeaderFormat)
}

/// Composes token verification and policy lookup into one decision.
#[derive(Clone)]
pub struct AuthGate {
    verifier: TokenVerifier,
    policies: PolicyLookup,
}

impl AuthGate {
    pub fn new(verifier: TokenVerifier, policies: PolicyLookup) -> Self {
        Self { verifier, policies }
    }

    /// Decide whether the request with `headers` may call `path`.
    #[instrument(skip_all, fields(path = %path))]
    pub async fn authorize(&self, headers: &HeaderMap, path: &str) -> Decision {
        let decision = match self.evaluate(headers, path).await {
            Ok(identity) => Decision::Allow(identity),
            Err(rejection) => {
                debug!(
                    target: "auth.gate",
                    reason = rejection.reason(),
                    status = rejection.status_code(),
                    "Request rejected"
                );
                Decision::Reject(rejection)
            }
        };

        metrics::record_gate_decision(match &decision {
            Decision::Allow(_) => "allow",
            Decision::Reject(rejection) => rejection.reason(),
        });

        decision
    }

    async fn evaluate(&self, headers: &HeaderMap, path: &str) -> Result<Identity, Rejection> {
        let token = extract_bearer_token(headers)?;

        let claims = self
            .verifier
            .verify(token)
            .await
            .map_err(Rejection::InvalidToken)?;

        let (identity, subject_id) = match claims.subject_type {
            SubjectType::User => (Identity::User(claims.user_id), claims.user_id),
            SubjectType::Caller => (Identity::Caller(claims.client_id), claims.client_id),
            SubjectType::Unknown => return Err(Rejection::UnknownSubjectType),
        };

        let patterns = self
            .policies
            .permitted_patterns(claims.subject_type, subject_id)
            .await
            .map_err(Rejection::PolicyUnavailable)?;

        if !policy::matches(path, &patterns) {
            return Err(Rejection::PermissionDenied);
        }

        Ok(identity)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::errors::CacheError;
    use crate::key_store::KeyStore;
    use crate::policy::PolicyStore;
    use async_trait::async_trait;
    use axum::http::HeaderValue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn headers(value: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_bytes(value).unwrap());
        headers
    }

    struct CountingStore {
        reads: AtomicUsize,
    }

    #[async_trait]
    impl PolicyStore for CountingStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(Some(r#"["/**"]"#.to_string()))
        }
    }

    fn gate(store: Arc<CountingStore>) -> AuthGate {
        AuthGate::new(
            TokenVerifier::new(Arc::new(KeyStore::new())),
            PolicyLookup::new(store),
        )
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token(&headers(b"Bearer abc.def.ghi")), Ok("abc.def.ghi"));
    }

    #[test]
    fn test_missing_header() {
        assert_eq!(
            extract_bearer_token(&HeaderMap::new()),
            Err(Rejection::MissingHeader)
        );
        assert_eq!(
            extract_bearer_token(&headers(b"")),
            Err(Rejection::MissingHeader)
        );
    }

    #[test]
    fn test_wrong_scheme() {
        assert_eq!(
            extract_bearer_token(&headers(b"Token abc")),
            Err(Rejection::InvalidHeaderFormat)
        );
        assert_eq!(
            extract_bearer_token(&headers(b"bearer abc")),
            Err(Rejection::InvalidHeaderFormat)
        );
        assert_eq!(
            extract_bearer_token(&headers(b"Bearer")),
            Err(Rejection::InvalidHeaderFormat)
        );
    }

    #[test]
    fn test_non_utf8_header_is_invalid_format() {
        assert_eq!(
            extract_bearer_token(&headers(b"Bearer \xff\xfe")),
            Err(Rejection::InvalidHeaderFormat)
        );
    }

    #[test]
    fn test_identity_accessors() {
        assert_eq!(Identity::User(42).user_id(), Some(42));
        assert_eq!(Identity::User(42).client_id(), None);
        assert_eq!(Identity::Caller(7).client_id(), Some(7));
        assert_eq!(Identity::Caller(7).user_id(), None);
    }

    #[tokio::test]
    async fn test_wrong_scheme_rejected_before_verification() {
        let store = Arc::new(CountingStore {
            reads: AtomicUsize::new(0),
        });
        let decision = gate(store.clone())
            .authorize(&headers(b"Token abc"), "/orders/5")
            .await;

        assert_eq!(decision, Decision::Reject(Rejection::InvalidHeaderFormat));
        assert_eq!(store.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_token_never_reaches_policy_cache() {
        let store = Arc::new(CountingStore {
            reads: AtomicUsize::new(0),
        });
        let decision = gate(store.clone())
            .authorize(&headers(b"Bearer not-a-jwt"), "/orders/5")
            .await;

        assert_eq!(
            decision,
            Decision::Reject(Rejection::InvalidToken(crate::errors::VerifyError::Malformed))
        );
        assert!(!decision.is_allowed());
        assert_eq!(store.reads.load(Ordering::SeqCst), 0);
    }
}
