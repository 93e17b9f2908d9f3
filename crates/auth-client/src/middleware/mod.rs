//! HTTP middleware for the axum request pipeline.

pub mod auth;

pub use auth::{require_permission, IdentityExt};
