//! Read access to the authority's user directory.
//!
//! Requests are authenticated with this service's own token from the
//! [`ClientTokenCache`]; a token that cannot be obtained fails the call
//! before any request is sent.

use crate::authority::AuthorityApi;
use crate::errors::UserApiError;
use crate::token_cache::ClientTokenCache;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

/// A user record as returned by the authority.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiUser {
    pub id: u64,
    pub username: String,

    /// Display name.
    pub name: String,

    #[serde(default)]
    pub phone: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    /// 0 = active, 1 = banned.
    pub status: i8,

    #[serde(default)]
    pub last_login_time: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl ApiUser {
    pub fn is_active(&self) -> bool {
        self.status == 0
    }
}

/// Contact details are redacted in Debug output.
impl fmt::Debug for ApiUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiUser")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("name", &self.name)
            .field("phone", &self.phone.as_ref().map(|_| "[REDACTED]"))
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .field("status", &self.status)
            .field("last_login_time", &self.last_login_time)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// User API client.
#[derive(Clone)]
pub struct UserApi {
    authority: Arc<dyn AuthorityApi>,
    tokens: Arc<ClientTokenCache>,
}

impl UserApi {
    pub fn new(authority: Arc<dyn AuthorityApi>, tokens: Arc<ClientTokenCache>) -> Self {
        Self { authority, tokens }
    }

    /// Fetch the user with `id`.
    ///
    /// # Errors
    ///
    /// - `UserApiError::Token` if no client token could be obtained
    /// - `UserApiError::Request` if the authority call fails
    #[instrument(skip_all, fields(user_id = id))]
    pub async fn info(&self, id: u64) -> Result<ApiUser, UserApiError> {
        let token = self.tokens.get_token().await.map_err(UserApiError::Token)?;

        self.authority
            .fetch_user(id, &token.value)
            .await
            .map_err(UserApiError::Request)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_full_record() {
        let user: ApiUser = serde_json::from_value(json!({
            "id": 3,
            "username": "bob",
            "name": "Bob",
            "phone": "+15550100",
            "email": null,
            "status": 1,
            "lastLoginTime": "2024-06-01T12:00:00Z",
            "createdAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(user.id, 3);
        assert_eq!(user.phone.as_deref(), Some("+15550100"));
        assert!(user.email.is_none());
        assert!(user.last_login_time.is_some());
        assert!(!user.is_active());
    }

    #[test]
    fn test_optional_fields_may_be_absent() {
        let user: ApiUser = serde_json::from_value(json!({
            "id": 4,
            "username": "carol",
            "name": "Carol",
            "status": 0,
            "createdAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap();

        assert!(user.phone.is_none());
        assert!(user.last_login_time.is_none());
        assert!(user.is_active());
    }

    #[test]
    fn test_debug_redacts_contact_details() {
        let user: ApiUser = serde_json::from_value(json!({
            "id": 5,
            "username": "dave",
            "name": "Dave",
            "phone": "+15550199",
            "email": "dave@example.com",
            "status": 0,
            "createdAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap();

        let debug = format!("{user:?}");
        assert!(!debug.contains("dave@example.com"));
        assert!(!debug.contains("+15550199"));
        assert!(debug.contains("dave"));
    }
}
