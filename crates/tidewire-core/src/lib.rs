//! Core infrastructure for tidewire.
//!
//! Holds the configuration error taxonomy shared by the connection engine and
//! the session client.

pub mod error;

pub use error::ConfigError;
