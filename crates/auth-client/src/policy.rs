//! Policy cache lookup.
//!
//! The authority publishes, per principal, a JSON list of URL patterns the
//! principal may call. This module reads that list and matches request paths
//! against it. It never decides on failure: a miss or a read error is
//! returned to the gate, which denies.
//!
//! # Key Patterns
//!
//! - `user:policies:{id}` - patterns for an end user
//! - `client:policies:{id}` - patterns for a calling application

use crate::auth::claims::SubjectType;
use crate::errors::CacheError;
use crate::path_pattern::matches_pattern;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// Key prefix for end-user policy entries.
pub const USER_POLICY_PREFIX: &str = "user:policies:";

/// Key prefix for calling-application policy entries.
pub const CLIENT_POLICY_PREFIX: &str = "client:policies:";

/// Cache key holding the patterns of one principal.
///
/// Returns `None` for `SubjectType::Unknown`, which has no namespace.
pub fn policy_key(subject_type: SubjectType, subject_id: u64) -> Option<String> {
    match subject_type {
        SubjectType::User => Some(format!("{USER_POLICY_PREFIX}{subject_id}")),
        SubjectType::Caller => Some(format!("{CLIENT_POLICY_PREFIX}{subject_id}")),
        SubjectType::Unknown => None,
    }
}

/// Read access to the external policy cache.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Raw value stored under `key`, `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
}

/// Redis-backed policy store.
///
/// `MultiplexedConnection` is cheap to clone and safe to use concurrently;
/// each read clones it.
#[derive(Clone)]
pub struct RedisPolicyStore {
    connection: MultiplexedConnection,
    timeout: Duration,
}

impl RedisPolicyStore {
    /// Connect to Redis at `redis_url`. Every read is bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Backend` if the URL is invalid or the connection fails.
    pub async fn connect(redis_url: &str, timeout: Duration) -> Result<Self, CacheError> {
        let client = Client::open(redis_url).map_err(|e| {
            // Do not log the URL; it may carry credentials.
            error!(target: "auth.policy", error = %e, "Failed to open Redis client");
            CacheError::Backend(format!("Failed to open Redis client: {e}"))
        })?;

        let connection = tokio::time::timeout(timeout, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| CacheError::Backend("Redis connection timed out".to_string()))?
            .map_err(|e| {
                error!(target: "auth.policy", error = %e, "Failed to connect to Redis");
                CacheError::Backend(format!("Failed to connect to Redis: {e}"))
            })?;

        Ok(Self::from_connection(connection, timeout))
    }

    /// Use an existing connection.
    pub fn from_connection(connection: MultiplexedConnection, timeout: Duration) -> Self {
        Self {
            connection,
            timeout,
        }
    }
}

#[async_trait]
impl PolicyStore for RedisPolicyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection.clone();

        let read = conn.get::<_, Option<String>>(key);
        let value = tokio::time::timeout(self.timeout, read)
            .await
            .map_err(|_| {
                warn!(target: "auth.policy", key = %key, "Policy cache read timed out");
                CacheError::Backend("Policy cache read timed out".to_string())
            })?
            .map_err(|e| {
                warn!(target: "auth.policy", key = %key, error = %e, "Policy cache read failed");
                CacheError::from(e)
            })?;

        Ok(value)
    }
}

/// Resolves principals to their permitted patterns.
#[derive(Clone)]
pub struct PolicyLookup {
    store: Arc<dyn PolicyStore>,
}

impl PolicyLookup {
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self { store }
    }

    /// Patterns the principal may call.
    ///
    /// # Errors
    ///
    /// - `CacheError::NotFound` if there is no entry (or the subject type has no namespace)
    /// - `CacheError::Backend` if the cache cannot be read
    /// - `CacheError::Deserialize` if the entry is not a JSON list of strings
    #[instrument(skip_all, fields(subject_type = subject_type.as_str()))]
    pub async fn permitted_patterns(
        &self,
        subject_type: SubjectType,
        subject_id: u64,
    ) -> Result<HashSet<String>, CacheError> {
        let key = policy_key(subject_type, subject_id)
            .ok_or_else(|| CacheError::NotFound(subject_type.as_str().to_string()))?;

        let raw = self
            .store
            .get(&key)
            .await?
            .ok_or_else(|| CacheError::NotFound(key.clone()))?;

        let patterns: Vec<String> = serde_json::from_str(&raw).map_err(|e| {
            warn!(target: "auth.policy", key = %key, error = %e, "Policy entry is not a pattern list");
            CacheError::Deserialize(e.to_string())
        })?;

        debug!(target: "auth.policy", pattern_count = patterns.len(), "Policy entry loaded");
        Ok(patterns.into_iter().collect())
    }
}

/// True if `request_path` matches at least one of `patterns`.
pub fn matches(request_path: &str, patterns: &HashSet<String>) -> bool {
    patterns
        .iter()
        .any(|pattern| matches_pattern(request_path, pattern))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct StaticStore {
        entries: HashMap<String, String>,
        fail: bool,
    }

    #[async_trait]
    impl PolicyStore for StaticStore {
        async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
            if self.fail {
                return Err(CacheError::Backend("connection refused".to_string()));
            }
            Ok(self.entries.get(key).cloned())
        }
    }

    fn lookup(entries: &[(&str, &str)], fail: bool) -> PolicyLookup {
        let entries = entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        PolicyLookup::new(Arc::new(StaticStore { entries, fail }))
    }

    fn set(patterns: &[&str]) -> HashSet<String> {
        patterns.iter().map(|p| (*p).to_string()).collect()
    }

    #[test]
    fn test_policy_keys() {
        assert_eq!(
            policy_key(SubjectType::User, 42).as_deref(),
            Some("user:policies:42")
        );
        assert_eq!(
            policy_key(SubjectType::Caller, 7).as_deref(),
            Some("client:policies:7")
        );
        assert!(policy_key(SubjectType::Unknown, 1).is_none());
    }

    #[tokio::test]
    async fn test_user_patterns_loaded() {
        let lookup = lookup(&[("user:policies:42", r#"["/orders/*","/me"]"#)], false);
        let patterns = lookup.permitted_patterns(SubjectType::User, 42).await.unwrap();
        assert_eq!(patterns, set(&["/orders/*", "/me"]));
    }

    #[tokio::test]
    async fn test_namespaces_are_separate() {
        let lookup = lookup(&[("user:policies:42", r#"["/orders/*"]"#)], false);
        let err = lookup
            .permitted_patterns(SubjectType::Caller, 42)
            .await
            .unwrap_err();
        assert_eq!(err, CacheError::NotFound("client:policies:42".to_string()));
    }

    #[tokio::test]
    async fn test_empty_list_is_not_an_error() {
        let lookup = lookup(&[("client:policies:3", "[]")], false);
        let patterns = lookup.permitted_patterns(SubjectType::Caller, 3).await.unwrap();
        assert!(patterns.is_empty());
    }

    #[tokio::test]
    async fn test_bad_entry_is_deserialize_error() {
        let lookup = lookup(&[("user:policies:1", "not json")], false);
        let err = lookup.permitted_patterns(SubjectType::User, 1).await.unwrap_err();
        assert!(matches!(err, CacheError::Deserialize(_)));
    }

    #[tokio::test]
    async fn test_backend_error_propagates() {
        let lookup = lookup(&[], true);
        let err = lookup.permitted_patterns(SubjectType::User, 1).await.unwrap_err();
        assert!(matches!(err, CacheError::Backend(_)));
    }

    #[tokio::test]
    async fn test_unknown_subject_type_not_found() {
        let lookup = lookup(&[], false);
        let err = lookup
            .permitted_patterns(SubjectType::Unknown, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::NotFound(_)));
    }

    #[test]
    fn test_matches_any_pattern() {
        let patterns = set(&["/orders/*", "/profile"]);
        assert!(matches("/orders/5", &patterns));
        assert!(matches("/profile", &patterns));
        assert!(!matches("/admin/delete", &patterns));
        assert!(!matches("/orders/5", &HashSet::new()));
    }
}
