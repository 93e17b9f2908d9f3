//! Token verification against the key store.
//!
//! Checks run in a fixed order and each has its own `VerifyError`:
//!
//! 1. size and structure (`Malformed`)
//! 2. declared algorithm is in the RSA family (`UnsupportedAlgorithm`)
//! 3. header carries a `kid` (`MissingKeyId`)
//! 4. the `kid` is in the current snapshot (`UnknownKeyId`)
//! 5. signature (`BadSignature`)
//! 6. expiry (`Expired`)
//!
//! # Security
//!
//! - The algorithm allow-list is checked before any key is touched, so a
//!   token claiming `HS256` or `none` never reaches signature verification
//! - `exp <= now` is expired; there is no leeway
//! - The failing step is logged at debug level only

use crate::auth::claims::Claims;
use crate::errors::VerifyError;
use crate::key_store::KeyStore;
use crate::observability::metrics;
use common::jwt::{parse_header, JwtValidationError};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, Validation};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Signing algorithms accepted from the authority.
pub const ACCEPTED_ALGORITHMS: [Algorithm; 3] =
    [Algorithm::RS256, Algorithm::RS384, Algorithm::RS512];

/// Verifies bearer tokens and yields their claims.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    key_store: Arc<KeyStore>,
}

impl TokenVerifier {
    pub fn new(key_store: Arc<KeyStore>) -> Self {
        Self { key_store }
    }

    /// Verify `token` at the current time.
    ///
    /// # Errors
    ///
    /// Returns the `VerifyError` of the first check that fails.
    #[instrument(skip_all)]
    pub async fn verify(&self, token: &str) -> Result<Claims, VerifyError> {
        self.verify_at(token, chrono::Utc::now().timestamp()).await
    }

    /// Verify `token` treating `now` (Unix seconds) as the current time.
    ///
    /// # Errors
    ///
    /// Returns the `VerifyError` of the first check that fails.
    pub async fn verify_at(&self, token: &str, now: i64) -> Result<Claims, VerifyError> {
        let result = self.run_checks(token, now).await;

        match &result {
            Ok(_) => metrics::record_token_verification("success"),
            Err(e) => {
                debug!(target: "auth.verifier", reason = e.as_str(), "Token verification failed");
                metrics::record_token_verification(e.as_str());
            }
        }

        result
    }

    async fn run_checks(&self, token: &str, now: i64) -> Result<Claims, VerifyError> {
        let header = parse_header(token).map_err(|e| match e {
            JwtValidationError::TokenTooLarge
            | JwtValidationError::MalformedToken
            | JwtValidationError::MissingKid => VerifyError::Malformed,
        })?;

        let algorithm = Algorithm::from_str(&header.alg)
            .ok()
            .filter(|alg| ACCEPTED_ALGORITHMS.contains(alg))
            .ok_or(VerifyError::UnsupportedAlgorithm)?;

        let kid = header.key_id().map_err(|_| VerifyError::MissingKeyId)?;

        let key = self
            .key_store
            .lookup(kid)
            .await
            .ok_or(VerifyError::UnknownKeyId)?;

        // A key published for one algorithm must not verify another.
        if !key.algorithm.is_empty() && key.algorithm != header.alg {
            return Err(VerifyError::UnsupportedAlgorithm);
        }

        let token_data = decode::<Claims>(token, key.decoding_key(), &validation(algorithm))
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidRsaKey(_)
                | ErrorKind::InvalidKeyFormat
                | ErrorKind::Crypto(_) => VerifyError::BadSignature,
                ErrorKind::InvalidAlgorithm => VerifyError::UnsupportedAlgorithm,
                _ => VerifyError::Malformed,
            })?;

        let claims = token_data.claims;
        if claims.exp.is_some_and(|exp| exp <= now) {
            return Err(VerifyError::Expired);
        }

        // Not yet valid is outside the validity window, same as expired.
        if claims.nbf.is_some_and(|nbf| nbf > now) {
            return Err(VerifyError::Expired);
        }

        Ok(claims)
    }
}

/// Signature-only validation; `exp` and `nbf` are checked separately with zero leeway.
fn validation(algorithm: Algorithm) -> Validation {
    let mut validation = Validation::new(algorithm);
    validation.leeway = 0;
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();
    validation
}
