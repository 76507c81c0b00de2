//! Connection lifecycle state.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

/// Where a client is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Not connected and no attempt pending.
    Disconnected = 0,
    /// A transport handshake is in progress.
    Connecting = 1,
    /// A transport session is established.
    Connected = 2,
    /// Waiting for the backoff delay before the next attempt.
    Reconnecting = 3,
    /// Explicitly disconnected by the application.
    Closed = 4,
}

impl ConnectionState {
    /// Returns true for the states that own (or are acquiring) the transport.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Reconnecting,
            4 => Self::Closed,
            _ => Self::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Lock-free view of the connection state, written by the I/O task and read
/// by application handles.
#[derive(Clone)]
pub struct SharedConnectionState {
    state: Arc<AtomicU8>,
    failed_attempts: Arc<AtomicU32>,
    paused: Arc<AtomicBool>,
}

impl SharedConnectionState {
    /// Creates a view starting in [`ConnectionState::Disconnected`].
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(ConnectionState::Disconnected as u8)),
            failed_attempts: Arc::new(AtomicU32::new(0)),
            paused: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Publishes a new state.
    pub fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Returns the consecutive failed connection attempts.
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts.load(Ordering::Acquire)
    }

    /// Publishes the consecutive failed connection attempts.
    pub fn set_failed_attempts(&self, attempts: u32) {
        self.failed_attempts.store(attempts, Ordering::Release);
    }

    /// Returns true while network activity is suspended.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Publishes the pause flag.
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }
}

impl Default for SharedConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SharedConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedConnectionState")
            .field("state", &self.state())
            .field("failed_attempts", &self.failed_attempts())
            .field("paused", &self.is_paused())
            .finish()
    }
}
