//! Verification key store.
//!
//! Holds the current key set published by the authority as an immutable
//! [`KeySnapshot`] behind an `Arc`. Readers clone the `Arc` under a read lock
//! and never see a partially built set; a replacement parses every entry
//! first and only then swaps the pointer under the write lock.
//!
//! # Security
//!
//! - Replacement is all-or-nothing: one unparseable entry rejects the set
//! - An empty key set is never installed
//! - A failed refresh never clears a populated store
//! - Key material is never logged

use crate::authority::{AuthorityApi, PublicKeyEntry};
use crate::errors::{KeyParseError, KeyRefreshError};
use crate::observability::metrics;
use chrono::{DateTime, Utc};
use jsonwebtoken::DecodingKey;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// A parsed public key ready for signature verification.
#[derive(Clone)]
pub struct VerificationKey {
    /// Key identifier, unique within a snapshot.
    pub id: String,

    /// Algorithm the authority declared for this key (may be empty).
    pub algorithm: String,

    /// Declared key use (normally "sig").
    pub usage: String,

    material: DecodingKey,
}

impl VerificationKey {
    /// Parse an RSA public key in PEM form.
    ///
    /// # Errors
    ///
    /// Returns `KeyParseError` if the PEM does not hold an RSA public key.
    pub fn from_entry(entry: &PublicKeyEntry) -> Result<Self, KeyParseError> {
        let material =
            DecodingKey::from_rsa_pem(entry.pem.as_bytes()).map_err(|e| KeyParseError {
                kid: entry.kid.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            id: entry.kid.clone(),
            algorithm: entry.alg.clone(),
            usage: entry.key_use.clone(),
            material,
        })
    }

    /// Key material for `jsonwebtoken::decode`.
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.material
    }
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey")
            .field("id", &self.id)
            .field("algorithm", &self.algorithm)
            .field("usage", &self.usage)
            .finish_non_exhaustive()
    }
}

/// An immutable key set as fetched at one point in time.
#[derive(Debug, Clone, Default)]
pub struct KeySnapshot {
    keys: Vec<VerificationKey>,
    index: HashMap<String, usize>,
    fetched_at: Option<DateTime<Utc>>,
}

impl KeySnapshot {
    /// Build a snapshot, parsing every entry.
    ///
    /// # Errors
    ///
    /// Fails on an empty set, on the first entry that does not parse, or on
    /// a duplicate kid.
    pub fn build(entries: &[PublicKeyEntry]) -> Result<Self, KeyParseError> {
        // An empty replacement would leave every token unverifiable.
        if entries.is_empty() {
            return Err(KeyParseError {
                kid: String::new(),
                reason: "empty key set".to_string(),
            });
        }

        let mut keys = Vec::with_capacity(entries.len());
        let mut index = HashMap::with_capacity(entries.len());

        for entry in entries {
            if entry.kid.is_empty() {
                return Err(KeyParseError {
                    kid: String::new(),
                    reason: "empty key identifier".to_string(),
                });
            }
            if index.contains_key(&entry.kid) {
                return Err(KeyParseError {
                    kid: entry.kid.clone(),
                    reason: "duplicate key identifier".to_string(),
                });
            }

            let key = VerificationKey::from_entry(entry)?;
            index.insert(key.id.clone(), keys.len());
            keys.push(key);
        }

        Ok(Self {
            keys,
            index,
            fetched_at: Some(Utc::now()),
        })
    }

    /// Key for `id`, if present.
    pub fn get(&self, id: &str) -> Option<&VerificationKey> {
        self.index.get(id).and_then(|&i| self.keys.get(i))
    }

    /// Keys in the order the authority listed them.
    pub fn keys(&self) -> &[VerificationKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// When the snapshot was installed; `None` for the initial empty snapshot.
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }
}

/// Concurrent store of the current key snapshot.
#[derive(Debug, Default)]
pub struct KeyStore {
    snapshot: RwLock<Arc<KeySnapshot>>,
}

impl KeyStore {
    /// Create an empty store. It must be populated before tokens verify.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current snapshot with `entries`.
    ///
    /// # Errors
    ///
    /// Returns `KeyParseError` if any entry fails to parse; the previous
    /// snapshot stays installed.
    pub async fn replace_snapshot(&self, entries: &[PublicKeyEntry]) -> Result<(), KeyParseError> {
        let next = Arc::new(KeySnapshot::build(entries)?);
        let count = next.len();

        *self.snapshot.write().await = next;

        debug!(target: "auth.key_store", key_count = count, "Key snapshot replaced");
        Ok(())
    }

    /// Key for `id` in the currently installed snapshot.
    pub async fn lookup(&self, id: &str) -> Option<VerificationKey> {
        self.snapshot.read().await.get(id).cloned()
    }

    /// The currently installed snapshot.
    pub async fn snapshot(&self) -> Arc<KeySnapshot> {
        Arc::clone(&*self.snapshot.read().await)
    }

    /// Fetch the key set from the authority and install it.
    ///
    /// Returns the number of keys installed. On failure the previous snapshot
    /// is retained and the error is returned for the caller to log or abort on.
    ///
    /// # Errors
    ///
    /// Returns `KeyRefreshError::Fetch` or `KeyRefreshError::Parse`.
    #[instrument(skip_all)]
    pub async fn refresh(&self, authority: &dyn AuthorityApi) -> Result<usize, KeyRefreshError> {
        let result = async {
            let entries = authority.fetch_public_keys().await?;
            self.replace_snapshot(&entries).await?;
            Ok::<usize, KeyRefreshError>(entries.len())
        }
        .await;

        match &result {
            Ok(count) => {
                info!(target: "auth.key_store", key_count = count, "Verification keys refreshed");
                metrics::record_key_refresh("success");
            }
            Err(e) => {
                warn!(
                    target: "auth.key_store",
                    error = %e,
                    "Key refresh failed, keeping previous snapshot"
                );
                metrics::record_key_refresh("error");
            }
        }

        result
    }
}
