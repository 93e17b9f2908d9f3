//! Cache for this service's own access token.
//!
//! The token is refreshed lazily: `get_token` returns the cached value while it
//! is outside the safety margin, and otherwise fetches a new one from the
//! authority. Concurrent callers that find the token stale share a single
//! fetch; the refresh mutex serialises them and the re-check under it lets
//! late arrivals pick up the token the first caller installed.
//!
//! A failed refresh leaves the previous token in place and reports the error
//! to the caller. The stale token is never returned from `get_token`.

use crate::authority::AuthorityApi;
use crate::errors::TokenFetchError;
use crate::observability::metrics;
use common::secret::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument, warn};

/// A token issued to this service.
#[derive(Debug, Clone)]
pub struct CachedToken {
    /// The bearer token value.
    pub value: SecretString,

    /// Expiry as Unix seconds.
    pub expires_at: i64,
}

impl CachedToken {
    /// True when the token outlives `now` by more than `margin`.
    ///
    /// A token expiring exactly at `now + margin` is stale.
    #[must_use]
    pub fn is_fresh_at(&self, now: i64, margin: Duration) -> bool {
        let margin = i64::try_from(margin.as_secs()).unwrap_or(i64::MAX);
        self.expires_at.saturating_sub(margin) > now
    }
}

/// Lazily refreshed, single-flight cache for the client token.
pub struct ClientTokenCache {
    authority: Arc<dyn AuthorityApi>,
    app_id: String,
    app_secret: SecretString,
    safety_margin: Duration,
    current: RwLock<Option<CachedToken>>,
    refresh_lock: Mutex<()>,
}

impl ClientTokenCache {
    /// Create an empty cache. The first `get_token` call fetches.
    pub fn new(
        authority: Arc<dyn AuthorityApi>,
        app_id: impl Into<String>,
        app_secret: SecretString,
        safety_margin: Duration,
    ) -> Self {
        Self {
            authority,
            app_id: app_id.into(),
            app_secret,
            safety_margin,
            current: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Return a token valid for at least the safety margin, with its expiry.
    ///
    /// # Errors
    ///
    /// Returns the authority error if a refresh was needed and failed.
    #[instrument(skip_all)]
    pub async fn get_token(&self) -> Result<CachedToken, TokenFetchError> {
        if let Some(token) = self.fresh_token().await {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited for the lock.
        if let Some(token) = self.fresh_token().await {
            debug!(target: "auth.token_cache", "Token refreshed by concurrent caller");
            return Ok(token);
        }

        debug!(target: "auth.token_cache", app_id = %self.app_id, "Refreshing client token");

        let issued = match self
            .authority
            .fetch_token(&self.app_id, &self.app_secret)
            .await
        {
            Ok(issued) => issued,
            Err(e) => {
                warn!(
                    target: "auth.token_cache",
                    error = %e,
                    "Client token refresh failed, keeping previous token"
                );
                metrics::record_token_refresh("error");
                return Err(e);
            }
        };

        let now = chrono::Utc::now().timestamp();
        if !issued.is_fresh_at(now, self.safety_margin) {
            warn!(
                target: "auth.token_cache",
                expires_at = issued.expires_at,
                margin_seconds = self.safety_margin.as_secs(),
                "Issued token lifetime is shorter than the safety margin"
            );
        }

        *self.current.write().await = Some(issued.clone());
        metrics::record_token_refresh("success");

        Ok(issued)
    }

    /// Expiry of the cached token, if one has been issued.
    pub async fn expires_at(&self) -> Option<i64> {
        self.current.read().await.as_ref().map(|t| t.expires_at)
    }

    async fn fresh_token(&self) -> Option<CachedToken> {
        let now = chrono::Utc::now().timestamp();
        self.current
            .read()
            .await
            .as_ref()
            .filter(|t| t.is_fresh_at(now, self.safety_margin))
            .cloned()
    }
}
