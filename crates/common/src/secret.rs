//! Secret types for protecting credentials from accidental logging.
//!
//! Re-exports [`secrecy`] so every crate in the workspace uses the same
//! wrapper for the app secret, client access tokens and bearer tokens.
//! `SecretString` implements `Debug` with redaction, so deriving `Debug` on a
//! struct that holds one is safe, and the value is zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct AppCredentials {
//!     app_id: String,
//!     secret: SecretString,
//! }
//!
//! let creds = AppCredentials {
//!     app_id: "cql23oyn".to_string(),
//!     secret: SecretString::from("s3cr3t"),
//! };
//!
//! assert!(!format!("{creds:?}").contains("s3cr3t"));
//! assert_eq!(creds.secret.expose_secret(), "s3cr3t");
//! ```

pub use secrecy::{ExposeSecret, SecretString};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("app-secret");
        let debug_str = format!("{secret:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("app-secret"));
    }

    #[test]
    fn test_token_response_deserializes_into_secret() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct TokenData {
            token: SecretString,
            #[serde(rename = "expiresAt")]
            expires_at: i64,
        }

        let json = r#"{"token": "eyJhbGciOi.payload.sig", "expiresAt": 1700000000}"#;
        let data: TokenData = serde_json::from_str(json).expect("deserialize");

        assert_eq!(data.token.expose_secret(), "eyJhbGciOi.payload.sig");

        let debug = format!("{data:?}");
        assert!(!debug.contains("eyJhbGciOi"));
        assert!(debug.contains("1700000000"));
    }

    #[test]
    fn test_clone_works() {
        let secret = SecretString::from("cloneable");
        let cloned = secret.clone();
        assert_eq!(cloned.expose_secret(), "cloneable");
    }
}
