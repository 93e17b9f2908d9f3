//! Auth Client Library
//!
//! Client-side trust cache for services that sit behind a central authority:
//!
//! - Verification keys fetched from the authority, swapped atomically
//! - This service's own access token, refreshed before expiry
//! - Bearer token verification (RSA signatures, key id, expiry)
//! - URL policy lookup in an external cache (Redis)
//! - A request gate composing the above into allow / 401 / 403
//!
//! # Architecture
//!
//! ```text
//! middleware/auth.rs -> gate.rs -> auth/verifier.rs -> key_store.rs
//!                               -> policy.rs -> path_pattern.rs
//! client.rs -> authority.rs, token_cache.rs, tasks/key_refresh.rs
//! ```
//!
//! # Modules
//!
//! - `config` - Client configuration from environment
//! - `errors` - Error types, including the HTTP rejection mapping
//! - `authority` - Authority HTTP API client
//! - `key_store` - Verification key snapshots
//! - `token_cache` - This service's own access token
//! - `auth` - Claims and token verification
//! - `policy` - Policy cache lookup
//! - `gate` - Per-request authorization decision
//! - `middleware` - axum middleware over the gate
//! - `users` - User directory reads
//! - `client` - Bootstrap and wiring

pub mod auth;
pub mod authority;
pub mod client;
pub mod config;
pub mod errors;
pub mod gate;
pub mod key_store;
pub mod middleware;
pub mod observability;
pub mod path_pattern;
pub mod policy;
pub mod tasks;
pub mod token_cache;
pub mod users;

pub use client::{AuthClient, ClientOptions, KeyRefreshMode};
pub use config::ClientConfig;
pub use gate::{AuthGate, Decision, Identity};
