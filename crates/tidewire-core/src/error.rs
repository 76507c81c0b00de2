//! Configuration errors.
//!
//! Invalid configuration supplied by the application is the only locally fatal
//! condition of a client, so it is reported synchronously from the setter that
//! received it rather than deferred to connection time.

use thiserror::Error;

/// Errors raised by configuration setters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The server list was empty.
    #[error("server list must contain at least one address")]
    EmptyServerList,

    /// A server weight was outside `[0, 100]` or not a number.
    #[error("invalid weight `{weight}` for server `{address}`: expected an integer in 0..=100")]
    InvalidWeight {
        /// The offending server entry as given.
        address: String,
        /// The weight token as given.
        weight: String,
    },

    /// A server entry could not be parsed into `[weight ]address`.
    #[error("malformed server entry `{0}`")]
    MalformedServer(String),

    /// An unknown reconnect policy name.
    #[error("unknown reconnect policy `{0}`")]
    InvalidPolicy(String),

    /// An unknown transport name.
    #[error("unknown transport `{0}`")]
    InvalidTransport(String),

    /// A numeric or duration setting outside its allowed range.
    #[error("invalid value for `{name}`: {reason}")]
    InvalidValue {
        /// Name of the setting.
        name: &'static str,
        /// Why the value was rejected.
        reason: &'static str,
    },
}
