//! Deterministic crypto fixtures for reproducible tests.
//!
//! The key pairs live in `common::testing`; this module adds the shapes the
//! auth client consumes (key entries, encoding keys).
//!
//! **NEVER use these keys outside tests.**

use auth_client::authority::PublicKeyEntry;
use jsonwebtoken::EncodingKey;

pub use common::testing::{
    MALFORMED_PUBLIC_KEY_PEM, PRIMARY_KID, PRIMARY_PRIVATE_KEY_PEM, PRIMARY_PUBLIC_KEY_PEM,
    SECONDARY_KID, SECONDARY_PRIVATE_KEY_PEM, SECONDARY_PUBLIC_KEY_PEM,
};

/// A key entry as the authority would publish it.
pub fn key_entry(kid: &str, public_pem: &str) -> PublicKeyEntry {
    PublicKeyEntry {
        kid: kid.to_string(),
        alg: "RS256".to_string(),
        key_use: "sig".to_string(),
        pem: public_pem.to_string(),
    }
}

/// Entry for the primary key pair (`k1`).
pub fn primary_key_entry() -> PublicKeyEntry {
    key_entry(PRIMARY_KID, PRIMARY_PUBLIC_KEY_PEM)
}

/// Entry for the secondary key pair (`k2`).
pub fn secondary_key_entry() -> PublicKeyEntry {
    key_entry(SECONDARY_KID, SECONDARY_PUBLIC_KEY_PEM)
}

/// Entry whose PEM does not parse.
pub fn malformed_key_entry(kid: &str) -> PublicKeyEntry {
    key_entry(kid, MALFORMED_PUBLIC_KEY_PEM)
}

/// Signing key from a PKCS#8 private key PEM.
pub fn encoding_key(private_pem: &str) -> EncodingKey {
    EncodingKey::from_rsa_pem(private_pem.as_bytes()).expect("fixture key must parse")
}
