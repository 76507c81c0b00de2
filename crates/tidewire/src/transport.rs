//! The transport capability the client drives.
//!
//! A [`Transport`] opens [`Session`]s to a chosen server. Implementations own
//! the wire encoding, TLS and keep-alive handling; the client only sees typed
//! frames and the errors of [`TransportError`].

use crate::error::TransportError;
use crate::protocol::{ClientFrame, ServerFrame};
use futures::future::BoxFuture;
use std::fmt;
use std::str::FromStr;
use tidewire_core::ConfigError;

/// Transport flavor requested from the [`Transport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportKind {
    /// HTTP long-polling.
    Http,
    /// WebSocket.
    #[default]
    WebSocket,
}

impl TransportKind {
    /// Returns the canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Http => "HTTP",
            TransportKind::WebSocket => "WEBSOCKET",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HTTP" => Ok(TransportKind::Http),
            "WEBSOCKET" => Ok(TransportKind::WebSocket),
            _ => Err(ConfigError::InvalidTransport(s.to_string())),
        }
    }
}

/// Everything a [`Transport`] needs to open a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    /// `host:port` of the selected server.
    pub address: String,
    pub encrypted: bool,
    pub kind: TransportKind,
    /// Entitlement token presented during the handshake.
    pub token: Option<String>,
}

/// Opens sessions to servers.
pub trait Transport: Send + Sync + 'static {
    /// Performs the handshake with `target.address`.
    ///
    /// The returned future is dropped if the client is disconnected or paused
    /// while the handshake is in flight.
    fn open(
        &self,
        target: ConnectTarget,
    ) -> BoxFuture<'static, Result<Box<dyn Session>, TransportError>>;
}

/// An established duplex channel to one server.
pub trait Session: Send {
    /// Sends one frame.
    fn send(&mut self, frame: ClientFrame) -> BoxFuture<'_, Result<(), TransportError>>;

    /// Receives the next frame. An error ends the session.
    ///
    /// # Cancel safety
    ///
    /// The client polls this inside `tokio::select!`; dropping the future before
    /// it completes must not lose a frame.
    fn recv(&mut self) -> BoxFuture<'_, Result<ServerFrame, TransportError>>;

    /// Closes the session. Errors are ignored.
    fn close(&mut self) -> BoxFuture<'_, ()>;
}
