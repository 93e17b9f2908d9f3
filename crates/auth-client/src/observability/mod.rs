//! Observability for the auth client.
//!
//! The library only records metrics through the `metrics` facade; installing
//! an exporter is up to the embedding service.

pub mod metrics;
