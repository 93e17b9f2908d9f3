//! Token verification.
//!
//! - `claims`: the decoded token payload
//! - `verifier`: signature, algorithm, and expiry checks against the key store

pub mod claims;
pub mod verifier;

pub use claims::{Audience, Claims, SubjectType};
pub use verifier::TokenVerifier;
