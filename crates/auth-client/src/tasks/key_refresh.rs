//! Key refresh background task.
//!
//! Reloads the verification key set from the authority every `interval`.
//! The store is populated at bootstrap, so the first reload happens one full
//! interval after start. A failed reload is logged and the previous snapshot
//! stays in use until the next tick.
//!
//! # Graceful Shutdown
//!
//! The task exits when its cancellation token is triggered. An in-flight
//! fetch is allowed to finish first.

use crate::authority::AuthorityApi;
use crate::key_store::KeyStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Run the key refresh loop until `cancel_token` is cancelled.
#[instrument(skip_all, name = "auth.task.key_refresh")]
pub async fn start_key_refresh(
    key_store: Arc<KeyStore>,
    authority: Arc<dyn AuthorityApi>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    info!(
        target: "auth.task.key_refresh",
        interval_seconds = interval.as_secs(),
        "Starting key refresh task"
    );

    // tokio intervals cannot have a zero period.
    let interval = interval.max(Duration::from_secs(1));
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match key_store.refresh(authority.as_ref()).await {
                    Ok(count) => {
                        debug!(target: "auth.task.key_refresh", key_count = count, "Scheduled key refresh complete");
                    }
                    Err(e) => {
                        // Previous snapshot stays installed; retry next tick.
                        warn!(
                            target: "auth.task.key_refresh",
                            error = %e,
                            "Scheduled key refresh failed"
                        );
                    }
                }
            }
            () = cancel_token.cancelled() => {
                info!(
                    target: "auth.task.key_refresh",
                    "Key refresh task received shutdown signal, exiting"
                );
                break;
            }
        }
    }

    info!(target: "auth.task.key_refresh", "Key refresh task stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::authority::PublicKeyEntry;
    use crate::errors::{AuthorityError, KeyFetchError, TokenFetchError};
    use crate::token_cache::CachedToken;
    use crate::users::ApiUser;
    use async_trait::async_trait;
    use common::secret::SecretString;
    use common::testing::{PRIMARY_KID, PRIMARY_PUBLIC_KEY_PEM};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct KeyAuthority {
        fetches: AtomicUsize,
        failing: AtomicBool,
    }

    impl KeyAuthority {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                fetches: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl AuthorityApi for KeyAuthority {
        async fn fetch_public_keys(&self) -> Result<Vec<PublicKeyEntry>, KeyFetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(AuthorityError::Status(503));
            }
            Ok(vec![PublicKeyEntry {
                kid: PRIMARY_KID.to_string(),
                alg: "RS256".to_string(),
                key_use: "sig".to_string(),
                pem: PRIMARY_PUBLIC_KEY_PEM.to_string(),
            }])
        }

        async fn fetch_token(
            &self,
            _app_id: &str,
            _secret: &SecretString,
        ) -> Result<CachedToken, TokenFetchError> {
            Err(AuthorityError::Timeout)
        }

        async fn check_health(&self) -> Result<(), AuthorityError> {
            Ok(())
        }

        async fn fetch_user(
            &self,
            _id: u64,
            _bearer: &SecretString,
        ) -> Result<ApiUser, AuthorityError> {
            Err(AuthorityError::Status(404))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_refreshes_every_interval() {
        let authority = KeyAuthority::new();
        let store = Arc::new(KeyStore::new());
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(start_key_refresh(
            Arc::clone(&store),
            authority.clone(),
            Duration::from_secs(60),
            cancel.clone(),
        ));

        // Nothing happens before the first interval elapses.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(authority.fetches.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(authority.fetches.load(Ordering::SeqCst), 2);
        assert!(store.lookup(PRIMARY_KID).await.is_some());

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_snapshot_and_continues() {
        let authority = KeyAuthority::new();
        let store = Arc::new(KeyStore::new());
        store.refresh(authority.as_ref()).await.unwrap();
        authority.failing.store(true, Ordering::SeqCst);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(start_key_refresh(
            Arc::clone(&store),
            authority.clone(),
            Duration::from_secs(60),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(125)).await;
        assert_eq!(authority.fetches.load(Ordering::SeqCst), 3);
        assert!(store.lookup(PRIMARY_KID).await.is_some());

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancellation_stops_task() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        // Returns immediately rather than waiting an hour for the first tick.
        tokio::time::timeout(
            Duration::from_secs(5),
            start_key_refresh(
                Arc::new(KeyStore::new()),
                KeyAuthority::new(),
                Duration::from_secs(3600),
                cancel,
            ),
        )
        .await
        .unwrap();
    }
}
