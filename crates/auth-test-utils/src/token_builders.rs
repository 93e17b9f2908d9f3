//! Builder patterns for test tokens
//!
//! Produces compact RS-signed JWTs in the authority's claim format.

use crate::crypto_fixtures::{encoding_key, PRIMARY_KID, PRIMARY_PRIVATE_KEY_PEM};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, Header};
use serde_json::{json, Map, Value};

/// Builder for signed test tokens
///
/// Defaults: user 1, RS256, kid `k1`, signed with the primary key, expires
/// in one hour.
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_caller(7)
///     .expires_in(-1)
///     .build();
/// ```
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
    kid: Option<String>,
    algorithm: Algorithm,
    private_pem: String,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults
    pub fn new() -> Self {
        let now = Utc::now();
        let mut claims = Map::new();
        claims.insert("uid".to_string(), json!(1));
        claims.insert("tkt".to_string(), json!("u"));
        claims.insert("iat".to_string(), json!(now.timestamp()));
        claims.insert(
            "exp".to_string(),
            json!((now + Duration::seconds(3600)).timestamp()),
        );

        Self {
            claims,
            kid: Some(PRIMARY_KID.to_string()),
            algorithm: Algorithm::RS256,
            private_pem: PRIMARY_PRIVATE_KEY_PEM.to_string(),
        }
    }

    /// End-user token for `user_id`
    pub fn for_user(mut self, user_id: u64) -> Self {
        self.claims.remove("cid");
        self.claims.insert("uid".to_string(), json!(user_id));
        self.claims.insert("tkt".to_string(), json!("u"));
        self
    }

    /// Service token for `client_id`
    pub fn for_caller(mut self, client_id: u64) -> Self {
        self.claims.remove("uid");
        self.claims.insert("cid".to_string(), json!(client_id));
        self.claims.insert("tkt".to_string(), json!("c"));
        self
    }

    /// Raw `tkt` value, for unknown subject types
    pub fn with_token_type(mut self, tkt: &str) -> Self {
        self.claims.insert("tkt".to_string(), json!(tkt));
        self
    }

    /// Set expiration in seconds from now (negative for the past)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.claims.insert(
            "exp".to_string(),
            json!((Utc::now() + Duration::seconds(seconds)).timestamp()),
        );
        self
    }

    /// Set an absolute expiration (Unix seconds)
    pub fn expires_at(mut self, timestamp: i64) -> Self {
        self.claims.insert("exp".to_string(), json!(timestamp));
        self
    }

    /// Omit the `exp` claim
    pub fn without_expiry(mut self) -> Self {
        self.claims.remove("exp");
        self
    }

    /// Set an arbitrary claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Set the header `kid`
    pub fn with_kid(mut self, kid: &str) -> Self {
        self.kid = Some(kid.to_string());
        self
    }

    /// Omit the header `kid`
    pub fn without_kid(mut self) -> Self {
        self.kid = None;
        self
    }

    /// Sign with a different RSA algorithm
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Sign with a different private key
    pub fn signed_with(mut self, private_pem: &str) -> Self {
        self.private_pem = private_pem.to_string();
        self
    }

    /// The claims as a JSON value
    pub fn claims(&self) -> Value {
        Value::Object(self.claims.clone())
    }

    /// Build and sign the token
    pub fn build(self) -> String {
        let mut header = Header::new(self.algorithm);
        header.kid = self.kid;

        encode(
            &header,
            &Value::Object(self.claims),
            &encoding_key(&self.private_pem),
        )
        .expect("test token must sign")
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
