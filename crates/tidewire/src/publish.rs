//! Outstanding publishes and their resolution.

use crate::codec;
use crate::message::Message;
use crate::protocol::{OutboundMessage, PublishOutcome};
use crate::status::Status;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// Waiting to be written to a session.
    Queued,
    /// Written to the current session, awaiting the server's reply.
    Sent,
}

#[derive(Debug)]
struct PendingPublish {
    message: Message,
    submitted_at: Instant,
    stage: Stage,
}

/// Publishes that have not been resolved yet, in submission order.
///
/// Every publish is queued until it has been written to a session. After that,
/// publishes carrying closure data stay tracked until the server answers or
/// the client gives up on them, so each is resolved exactly once; publishes
/// without closure data are forgotten.
#[derive(Debug, Default)]
pub struct PublishTracker {
    entries: VecDeque<PendingPublish>,
}

impl PublishTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a publish submitted at `now`.
    pub fn submit(&mut self, message: Message, now: Instant) {
        self.entries.push_back(PendingPublish {
            message,
            submitted_at: now,
            stage: Stage::Queued,
        });
    }

    /// Encodes the oldest queued publish, leaving it queued until
    /// [`mark_sent`](Self::mark_sent) confirms the write.
    pub fn next_queued(&self) -> Option<OutboundMessage> {
        self.entries
            .iter()
            .find(|entry| entry.stage == Stage::Queued)
            .map(|entry| encode(&entry.message))
    }

    /// Records that the oldest queued publish was written to the session and
    /// returns how long it waited since submission.
    pub fn mark_sent(&mut self, now: Instant) -> Option<Duration> {
        let position = self
            .entries
            .iter()
            .position(|entry| entry.stage == Stage::Queued)?;
        let entry = &mut self.entries[position];
        let waited = now.saturating_duration_since(entry.submitted_at);
        if entry.message.closure().is_some() {
            entry.stage = Stage::Sent;
        } else {
            self.entries.remove(position);
        }
        Some(waited)
    }

    /// Requeues every sent publish; called when the session is lost before
    /// the server answered. Publishes keep their place in submission order.
    pub fn requeue(&mut self) {
        for entry in &mut self.entries {
            entry.stage = Stage::Queued;
        }
    }

    /// Resolves the oldest publish with `closure`.
    pub fn resolve(&mut self, closure: &str, outcome: PublishOutcome) -> Option<Status> {
        let position = self
            .entries
            .iter()
            .position(|entry| entry.message.closure() == Some(closure))?;
        self.entries.remove(position);

        let closure = closure.to_string();
        Some(match outcome {
            PublishOutcome::Ok => Status::PublishOk { closure },
            PublishOutcome::Failed => Status::PublishFailed { closure },
            PublishOutcome::Denied => Status::PublishDenied { closure },
            PublishOutcome::SizeLimitExceeded => Status::MessageSizeLimitExceeded { closure },
        })
    }

    /// Gives up on every outstanding publish.
    ///
    /// Returns a [`Status::PublishFailed`] per publish with closure data and
    /// the number of publishes without closure data that were dropped.
    pub fn fail_all(&mut self) -> (Vec<Status>, usize) {
        let mut failed = Vec::new();
        let mut dropped = 0;
        for entry in self.entries.drain(..) {
            match entry.message.closure() {
                Some(closure) => failed.push(Status::PublishFailed {
                    closure: closure.to_string(),
                }),
                None => dropped += 1,
            }
        }
        (failed, dropped)
    }

    /// Number of tracked publishes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds the wire form of `message`, compressing the content when requested
/// and worthwhile.
pub(crate) fn encode(message: &Message) -> OutboundMessage {
    let content = message.content().as_bytes();
    let compressed = message
        .is_compressed()
        .then(|| codec::compress_if_smaller(content))
        .flatten();

    OutboundMessage {
        subject: message.subject().to_string(),
        compressed: compressed.is_some(),
        payload: compressed.unwrap_or_else(|| content.to_vec()),
        closure: message.closure().map(str::to_string),
        reply_subject: message.reply_subject().map(str::to_string),
        qos: message.qos(),
        retained: message.is_retained(),
    }
}
