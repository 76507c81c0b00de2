//! Frames exchanged over a [`Session`](crate::Session).
//!
//! The byte-level encoding belongs to the transport implementation; the client
//! only speaks in these frames.

use crate::message::QoS;

/// Where a subscription should start delivering from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    /// Start with the latest retained message, then live traffic.
    Latest,
    /// Deliver up to `count` cached messages, oldest first, then live traffic.
    History { count: u32 },
    /// Replay everything after `seq` within `epoch`. The server answers with a
    /// [`ServerFrame::Recovery`] verdict for the subject.
    From { epoch: u64, seq: u64 },
}

/// A single subject in a [`ClientFrame::Subscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeRequest {
    pub subject: String,
    pub resume: Resume,
}

/// A message as sent to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub subject: String,
    /// Content, zlib-compressed when `compressed` is set.
    pub payload: Vec<u8>,
    pub compressed: bool,
    pub closure: Option<String>,
    pub reply_subject: Option<String>,
    pub qos: QoS,
    pub retained: bool,
}

/// Frames sent by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    Subscribe(Vec<SubscribeRequest>),
    Unsubscribe(Vec<String>),
    Publish(OutboundMessage),
}

/// How the server delivered an [`InboundMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Regular live traffic.
    Live,
    /// Retained message sent on (re)subscription.
    Retained,
    /// Replayed from the cache after a [`Resume::From`] request.
    Replay,
    /// Served from the cache for a [`Resume::History`] request.
    History,
}

/// A message as received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub subject: String,
    pub payload: Vec<u8>,
    pub compressed: bool,
    pub reply_subject: Option<String>,
    pub qos: QoS,
    pub retained: bool,
    pub seq: u64,
    pub epoch: u64,
    pub delivery: Delivery,
}

/// Server verdict on a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Ok,
    Failed,
    Denied,
    SizeLimitExceeded,
}

/// Frames sent by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerFrame {
    /// Entitlement decision for a subscription.
    SubscribeReply { subject: String, allowed: bool },
    /// Answer to a [`Resume::From`] request. `continuous` is set when the
    /// server still holds every message after the requested sequence number.
    Recovery {
        subject: String,
        epoch: u64,
        continuous: bool,
    },
    Message(InboundMessage),
    PublishReply {
        closure: String,
        outcome: PublishOutcome,
    },
}
