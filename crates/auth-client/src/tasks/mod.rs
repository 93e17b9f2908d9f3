//! Background tasks.
//!
//! - `key_refresh`: periodic reload of the verification key set

pub mod key_refresh;

pub use key_refresh::start_key_refresh;
