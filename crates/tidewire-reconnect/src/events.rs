//! Diagnostic events of the connection engine.
//!
//! These are separate from the application listener contract: observers run
//! synchronously on the connection task and must not block.

use crate::scheduler::ReconnectPhase;
use crate::state::ConnectionState;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Events emitted by the connection engine.
#[derive(Debug, Clone)]
pub enum ReconnectEvent {
    /// The connection state changed.
    StateTransition {
        client_name: String,
        timestamp: Instant,
        from: ConnectionState,
        to: ConnectionState,
    },
    /// A server was picked for the next connection attempt.
    ServerSelected {
        client_name: String,
        timestamp: Instant,
        address: String,
    },
    /// A reconnect attempt was scheduled.
    ReconnectScheduled {
        client_name: String,
        timestamp: Instant,
        phase: ReconnectPhase,
        attempt: u32,
        delay: Duration,
    },
    /// The reconnect rate exceeded its threshold for the current window.
    RateExceeded {
        client_name: String,
        timestamp: Instant,
        attempts: usize,
    },
}

impl ReconnectEvent {
    /// Short snake_case name of the event kind.
    pub fn event_type(&self) -> &'static str {
        match self {
            ReconnectEvent::StateTransition { .. } => "state_transition",
            ReconnectEvent::ServerSelected { .. } => "server_selected",
            ReconnectEvent::ReconnectScheduled { .. } => "reconnect_scheduled",
            ReconnectEvent::RateExceeded { .. } => "rate_exceeded",
        }
    }

    pub fn timestamp(&self) -> Instant {
        match self {
            ReconnectEvent::StateTransition { timestamp, .. }
            | ReconnectEvent::ServerSelected { timestamp, .. }
            | ReconnectEvent::ReconnectScheduled { timestamp, .. }
            | ReconnectEvent::RateExceeded { timestamp, .. } => *timestamp,
        }
    }

    /// Name of the client that emitted the event.
    pub fn client_name(&self) -> &str {
        match self {
            ReconnectEvent::StateTransition { client_name, .. }
            | ReconnectEvent::ServerSelected { client_name, .. }
            | ReconnectEvent::ReconnectScheduled { client_name, .. }
            | ReconnectEvent::RateExceeded { client_name, .. } => client_name,
        }
    }
}

/// Observer of [`ReconnectEvent`]s.
///
/// Implemented for every `Fn(&ReconnectEvent)` closure.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &ReconnectEvent);
}

impl<F> EventListener for F
where
    F: Fn(&ReconnectEvent) + Send + Sync,
{
    fn on_event(&self, event: &ReconnectEvent) {
        self(event)
    }
}

/// The observers registered on one client, called in registration order.
#[derive(Clone, Default)]
pub struct EventListeners {
    listeners: Vec<Arc<dyn EventListener>>,
}

impl EventListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Hands `event` to every observer and returns how many of them panicked.
    ///
    /// A panicking observer does not keep the event from the ones after it.
    pub fn emit(&self, event: &ReconnectEvent) -> usize {
        self.listeners
            .iter()
            .filter(|listener| {
                catch_unwind(AssertUnwindSafe(|| listener.on_event(event))).is_err()
            })
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl fmt::Debug for EventListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}
