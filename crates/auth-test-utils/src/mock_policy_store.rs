//! In-memory policy cache for gate tests.
//!
//! Stores raw values under the same keys the Redis store uses, so malformed
//! entries can be planted as easily as valid ones.
//!
//! # Example
//!
//! ```rust,ignore
//! let store = MockPolicyStore::new()
//!     .with_user_patterns(42, &["/orders/*"])
//!     .with_raw("client:policies:7", "not json");
//!
//! store.set_failing(true); // every read now returns CacheError::Backend
//! ```

use async_trait::async_trait;
use auth_client::auth::SubjectType;
use auth_client::errors::CacheError;
use auth_client::policy::{policy_key, PolicyStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Mock policy cache.
#[derive(Debug, Clone, Default)]
pub struct MockPolicyStore {
    inner: Arc<Mutex<MockPolicyStoreInner>>,
}

#[derive(Debug, Default)]
struct MockPolicyStoreInner {
    entries: HashMap<String, String>,
    failing: bool,
    reads: usize,
}

impl MockPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Patterns for end user `user_id`.
    pub fn with_user_patterns(self, user_id: u64, patterns: &[&str]) -> Self {
        self.with_patterns(SubjectType::User, user_id, patterns)
    }

    /// Patterns for calling application `client_id`.
    pub fn with_client_patterns(self, client_id: u64, patterns: &[&str]) -> Self {
        self.with_patterns(SubjectType::Caller, client_id, patterns)
    }

    fn with_patterns(self, subject_type: SubjectType, id: u64, patterns: &[&str]) -> Self {
        let key = policy_key(subject_type, id).expect("subject type has a namespace");
        let raw = serde_json::to_string(patterns).expect("patterns serialize");
        self.with_raw(&key, &raw)
    }

    /// Raw value under `key`.
    pub fn with_raw(self, key: &str, raw: &str) -> Self {
        self.inner
            .lock()
            .unwrap()
            .entries
            .insert(key.to_string(), raw.to_string());
        self
    }

    /// Make every read fail with `CacheError::Backend`.
    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().unwrap().failing = failing;
    }

    /// Number of reads so far.
    pub fn reads(&self) -> usize {
        self.inner.lock().unwrap().reads
    }
}

#[async_trait]
impl PolicyStore for MockPolicyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut inner = self.inner.lock().unwrap();
        inner.reads += 1;

        if inner.failing {
            return Err(CacheError::Backend("mock policy store failure".to_string()));
        }

        Ok(inner.entries.get(key).cloned())
    }
}
