//! Failover-aware publish/subscribe session client.
//!
//! A [`Client`] keeps one session open to a cluster of servers chosen by
//! weight, and keeps the application's view of its subjects continuous across
//! failovers:
//!
//! - **Failover**: when a connection fails or breaks, another server is picked
//!   and retried with a two-phase backoff (short linear retries, then a
//!   constant or truncated exponential policy)
//! - **Gap recovery**: on reconnect every subject resumes from the last message
//!   seen; the server either replays the missing messages (`NOTIFY_DATA_SYNC`)
//!   or the subject restarts from a snapshot (`NOTIFY_DATA_RESYNC`)
//! - **Guaranteed publishing**: publishes with closure data are resolved
//!   exactly once, and queued while no connection is available
//! - **Serial delivery**: the [`Listener`] sees messages and statuses one at a
//!   time, in order, on a task of its own
//!
//! The wire protocol is supplied by a [`Transport`] implementation.
//!
//! # Message types
//!
//! Received messages carry a [`MessageType`]:
//!
//! | type         | delivered when                                              |
//! |--------------|-------------------------------------------------------------|
//! | `SNAPSHOT`   | first message after a fresh subscription or a resync        |
//! | `UPDATE`     | live traffic after that                                     |
//! | `RECOVERED`  | replayed after a failover sync                              |
//! | `HISTORICAL` | requested through [`Client::subscribe_with_history`]        |
//!
//! # Feature flags
//!
//! - `metrics`: record connection, reconnect-rate and publish counters with the
//!   `metrics` crate

mod client;
mod codec;
mod config;
mod dispatcher;
mod error;
mod log;
mod machine;
mod message;
mod protocol;
mod publish;
mod recovery;
mod registry;
mod status;
mod transport;

pub use client::Client;
pub use codec::MAX_DECOMPRESSED_SIZE;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use dispatcher::{EventDispatcher, Listener};
pub use error::{ClientError, TransportError};
pub use log::{LogLevel, LogListener};
pub use message::{Message, MessageType, QoS};
pub use protocol::{
    ClientFrame, Delivery, InboundMessage, OutboundMessage, PublishOutcome, Resume,
    ServerFrame, SubscribeRequest,
};
pub use publish::PublishTracker;
pub use recovery::GapRecovery;
pub use registry::{SubjectSubscription, SubscriptionRegistry, Watermark};
pub use status::Status;
pub use transport::{ConnectTarget, Session, Transport, TransportKind};

pub use tidewire_core::ConfigError;
pub use tidewire_reconnect::{ConnectionState, ReconnectEvent, ReconnectPolicy};
