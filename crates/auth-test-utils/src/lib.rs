//! # Auth Test Utilities
//!
//! Shared test utilities for the auth client.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (fixed RSA keys for reproducible tests)
//! - Token builders (`TestTokenBuilder`)
//! - A wiremock-backed authority (`MockAuthority`)
//! - An in-memory policy cache (`MockPolicyStore`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use auth_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let authority = MockAuthority::start().await;
//!     authority.mount_healthy().await;
//!     authority.mount_public_keys(&[primary_key_entry()]).await;
//!
//!     let token = TestTokenBuilder::new().for_user(42).build();
//!     let policies = MockPolicyStore::new().with_user_patterns(42, &["/orders/*"]);
//! }
//! ```

pub mod crypto_fixtures;
pub mod mock_authority;
pub mod mock_policy_store;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use mock_authority::*;
pub use mock_policy_store::*;
pub use token_builders::*;
