//! Common utilities shared across the auth client crates.

#![warn(clippy::pedantic)]

/// Module for common configuration
pub mod config;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (size limits, header parsing)
pub mod jwt;

/// Module for tracing subscriber initialisation
pub mod observability;

/// Deterministic key fixtures for tests
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
