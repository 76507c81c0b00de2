//! Client and transport errors.

use std::io;
use thiserror::Error;
use tidewire_core::ConfigError;

/// Errors reported by a [`Transport`](crate::Transport) or an open
/// [`Session`](crate::Session).
#[derive(Debug, Error)]
pub enum TransportError {
    /// The handshake with the server was refused or did not complete.
    #[error("connection to `{address}` failed: {reason}")]
    ConnectFailed { address: String, reason: String },

    /// The server closed the session.
    #[error("session closed by peer")]
    Closed,

    /// The session went silent (no traffic, not even keep-alives) and was
    /// abandoned.
    #[error("session stalled")]
    Stalled,

    /// An underlying I/O error.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Whether this failure indicates an atypical condition that warrants a
    /// longer reconnect delay.
    pub fn is_atypical(&self) -> bool {
        matches!(self, TransportError::Stalled)
    }
}

/// Errors returned by [`Client`](crate::Client) operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The client's background task has stopped.
    #[error("client has terminated")]
    Terminated,
}
