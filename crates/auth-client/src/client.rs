//! Auth client bootstrap and wiring.
//!
//! [`AuthClient::connect`] brings the trust cache up in a fixed order and
//! fails if any step fails:
//!
//! 1. authority health check
//! 2. initial client token
//! 3. initial key set
//! 4. (internal mode) spawn the periodic key refresh task
//!
//! Optional collaborators come in through [`ClientOptions`]; anything not
//! supplied is built from [`ClientConfig`].

use crate::auth::verifier::TokenVerifier;
use crate::authority::{AuthorityApi, HttpAuthority};
use crate::config::ClientConfig;
use crate::errors::{InitError, KeyRefreshError, TokenFetchError};
use crate::gate::AuthGate;
use crate::key_store::KeyStore;
use crate::policy::{PolicyLookup, PolicyStore, RedisPolicyStore};
use crate::tasks::key_refresh::start_key_refresh;
use crate::token_cache::ClientTokenCache;
use crate::users::UserApi;
use common::secret::SecretString;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

/// Who drives periodic key reloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyRefreshMode {
    /// The client spawns its own refresh task.
    #[default]
    Internal,

    /// The embedding service calls [`AuthClient::refresh_public_keys`] on its own schedule.
    External,
}

/// Optional collaborators for [`AuthClient::connect`].
#[derive(Clone, Default)]
pub struct ClientOptions {
    /// HTTP client for authority calls. Its timeouts replace `http_timeout`.
    pub http_client: Option<reqwest::Client>,

    /// Authority implementation; takes precedence over `http_client`.
    pub authority: Option<Arc<dyn AuthorityApi>>,

    pub key_refresh: KeyRefreshMode,
}

impl ClientOptions {
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn with_authority(mut self, authority: Arc<dyn AuthorityApi>) -> Self {
        self.authority = Some(authority);
        self
    }

    pub fn with_key_refresh(mut self, mode: KeyRefreshMode) -> Self {
        self.key_refresh = mode;
        self
    }
}

/// A connected trust cache.
pub struct AuthClient {
    authority: Arc<dyn AuthorityApi>,
    key_store: Arc<KeyStore>,
    tokens: Arc<ClientTokenCache>,
    gate: Arc<AuthGate>,
    users: UserApi,
    cancel_token: CancellationToken,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl AuthClient {
    /// Connect using a Redis policy store at `config.redis_url`.
    ///
    /// # Errors
    ///
    /// Returns `InitError::PolicyCache` if Redis is unreachable, or any
    /// error from [`AuthClient::connect`].
    pub async fn connect_with_redis(
        config: ClientConfig,
        options: ClientOptions,
    ) -> Result<Self, InitError> {
        let store = RedisPolicyStore::connect(&config.redis_url, config.http_timeout)
            .await
            .map_err(InitError::PolicyCache)?;

        Self::connect(config, options, Arc::new(store)).await
    }

    /// Bootstrap the client.
    ///
    /// # Errors
    ///
    /// Returns the `InitError` of the first step that fails; nothing is left
    /// running on failure.
    #[instrument(skip_all, fields(app_id = %config.app_id))]
    pub async fn connect(
        config: ClientConfig,
        options: ClientOptions,
        policy_store: Arc<dyn PolicyStore>,
    ) -> Result<Self, InitError> {
        let authority: Arc<dyn AuthorityApi> = match (options.authority, options.http_client) {
            (Some(authority), _) => authority,
            (None, Some(client)) => Arc::new(HttpAuthority::with_client(&config.base_url, client)),
            (None, None) => Arc::new(
                HttpAuthority::new(&config.base_url, config.http_timeout)
                    .map_err(|e| InitError::Configuration(e.to_string()))?,
            ),
        };

        authority.check_health().await.map_err(|e| {
            error!(target: "auth.client", error = %e, "Authority health check failed");
            InitError::Health(e)
        })?;

        let tokens = Arc::new(ClientTokenCache::new(
            Arc::clone(&authority),
            config.app_id.clone(),
            config.app_secret.clone(),
            config.token_safety_margin,
        ));
        tokens.get_token().await.map_err(|e| {
            error!(target: "auth.client", error = %e, "Initial client token acquisition failed");
            InitError::Token(e)
        })?;

        let key_store = Arc::new(KeyStore::new());
        let key_count = key_store.refresh(authority.as_ref()).await.map_err(|e| {
            error!(target: "auth.client", error = %e, "Initial key load failed");
            InitError::Keys(e)
        })?;

        let gate = Arc::new(AuthGate::new(
            TokenVerifier::new(Arc::clone(&key_store)),
            PolicyLookup::new(policy_store),
        ));
        let users = UserApi::new(Arc::clone(&authority), Arc::clone(&tokens));

        let cancel_token = CancellationToken::new();
        let refresh_task = match options.key_refresh {
            KeyRefreshMode::Internal => Some(tokio::spawn(start_key_refresh(
                Arc::clone(&key_store),
                Arc::clone(&authority),
                config.key_refresh_interval,
                cancel_token.clone(),
            ))),
            KeyRefreshMode::External => None,
        };

        info!(
            target: "auth.client",
            key_count,
            key_refresh = ?options.key_refresh,
            "Auth client ready"
        );

        Ok(Self {
            authority,
            key_store,
            tokens,
            gate,
            users,
            cancel_token,
            refresh_task: Mutex::new(refresh_task),
        })
    }

    /// Gate for the request pipeline (see `middleware::require_permission`).
    pub fn gate(&self) -> Arc<AuthGate> {
        Arc::clone(&self.gate)
    }

    pub fn key_store(&self) -> Arc<KeyStore> {
        Arc::clone(&self.key_store)
    }

    pub fn users(&self) -> &UserApi {
        &self.users
    }

    /// This service's own access token, refreshed if needed.
    ///
    /// # Errors
    ///
    /// Returns the authority error if a needed refresh failed.
    pub async fn client_token(&self) -> Result<SecretString, TokenFetchError> {
        self.tokens.get_token().await.map(|token| token.value)
    }

    /// Reload the key set now. Entry point for external schedulers.
    ///
    /// # Errors
    ///
    /// Returns the refresh error; the previous key set stays in use.
    pub async fn refresh_public_keys(&self) -> Result<usize, KeyRefreshError> {
        self.key_store.refresh(self.authority.as_ref()).await
    }

    /// Stop the internal refresh task, if any, and wait for it to exit.
    pub async fn shutdown(&self) {
        self.cancel_token.cancel();

        if let Some(handle) = self.refresh_task.lock().await.take() {
            if let Err(e) = handle.await {
                error!(target: "auth.client", error = %e, "Key refresh task ended abnormally");
            }
        }
    }
}

impl Drop for AuthClient {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
