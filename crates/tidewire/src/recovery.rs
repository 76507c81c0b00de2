//! Resubscription planning and classification of inbound messages.
//!
//! On every (re)connect each subscribed subject is requested either from its
//! watermark, with a history count, or from its latest retained message. The
//! server's [`Recovery`](crate::protocol::ServerFrame::Recovery) verdict for a
//! watermark request decides between a sync (replay continues seamlessly) and
//! a resync (the subject starts over from a snapshot). Incoming messages are
//! then labelled according to the phase their subject is in:
//!
//! | phase            | `History`    | `Replay`    | `Retained` | `Live`     |
//! |------------------|--------------|-------------|------------|------------|
//! | history (n left) | HISTORICAL   | SNAPSHOT    | SNAPSHOT   | SNAPSHOT   |
//! | recovering       | dropped      | RECOVERED   | SNAPSHOT   | UPDATE     |
//! | fresh            | dropped      | SNAPSHOT    | SNAPSHOT   | SNAPSHOT   |
//! | live             | dropped      | UPDATE      | SNAPSHOT   | UPDATE     |
//!
//! Anything other than a history message moves the subject to the live phase.
//! Guaranteed messages already covered by the watermark are dropped.

use crate::message::{MessageType, QoS};
use crate::protocol::{Delivery, InboundMessage, Resume, SubscribeRequest};
use crate::registry::{SubjectSubscription, SubscriptionRegistry};
use crate::status::Status;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    History { remaining: u32 },
    AwaitingVerdict,
    Recovering,
    Fresh,
    Live,
}

/// Tracks where each subject stands since its last (re)subscription.
#[derive(Debug, Default)]
pub struct GapRecovery {
    phases: HashMap<String, Phase>,
}

impl GapRecovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the subscription requests for every registered subject.
    pub fn plan_all(&mut self, registry: &SubscriptionRegistry) -> Vec<SubscribeRequest> {
        registry.iter().map(|entry| self.plan(entry)).collect()
    }

    /// Builds the subscription requests for the given registered subjects.
    pub fn plan_subjects<'a, I>(
        &mut self,
        registry: &SubscriptionRegistry,
        subjects: I,
    ) -> Vec<SubscribeRequest>
    where
        I: IntoIterator<Item = &'a str>,
    {
        subjects
            .into_iter()
            .filter_map(|subject| registry.get(subject))
            .map(|entry| self.plan(entry))
            .collect()
    }

    fn plan(&mut self, entry: &SubjectSubscription) -> SubscribeRequest {
        let (resume, phase) = match entry.watermark() {
            Some(watermark) => (
                Resume::From {
                    epoch: watermark.epoch,
                    seq: watermark.seq,
                },
                Phase::AwaitingVerdict,
            ),
            None if entry.history() > 0 => (
                Resume::History {
                    count: entry.history(),
                },
                Phase::History {
                    remaining: entry.history(),
                },
            ),
            None => (Resume::Latest, Phase::Fresh),
        };
        self.phases.insert(entry.subject().to_string(), phase);
        SubscribeRequest {
            subject: entry.subject().to_string(),
            resume,
        }
    }

    /// Applies the server's continuity verdict for `subject`.
    ///
    /// Returns the status to report, or `None` when no verdict was expected.
    pub fn on_verdict(
        &mut self,
        registry: &mut SubscriptionRegistry,
        subject: &str,
        epoch: u64,
        continuous: bool,
    ) -> Option<Status> {
        let phase = self.phases.get_mut(subject)?;
        if *phase != Phase::AwaitingVerdict {
            return None;
        }
        let watermark = registry.get(subject)?.watermark();

        if continuous && watermark.is_some_and(|watermark| watermark.epoch == epoch) {
            *phase = Phase::Recovering;
            Some(Status::DataSync {
                subject: subject.to_string(),
            })
        } else {
            *phase = Phase::Fresh;
            registry.reset_watermark(subject);
            Some(Status::DataResync {
                subject: subject.to_string(),
            })
        }
    }

    /// Classifies an inbound message and advances the subject's watermark.
    ///
    /// Returns `None` when the message must not be delivered: the subject is
    /// not subscribed, the message is a duplicate, or it is a history message
    /// beyond the requested count.
    pub fn accept(
        &mut self,
        registry: &mut SubscriptionRegistry,
        message: &InboundMessage,
    ) -> Option<MessageType> {
        let entry = registry.get(&message.subject)?;
        let guaranteed = message.qos == QoS::Guaranteed;
        if guaranteed
            && entry
                .watermark()
                .is_some_and(|watermark| watermark.covers(message.epoch, message.seq))
        {
            return None;
        }

        let phase = self
            .phases
            .entry(message.subject.clone())
            .or_insert(Phase::Fresh);

        let message_type = match (message.delivery, *phase) {
            (Delivery::History, Phase::History { remaining }) if remaining > 0 => {
                *phase = Phase::History {
                    remaining: remaining - 1,
                };
                MessageType::Historical
            }
            (Delivery::History, _) => return None,
            (Delivery::Replay, Phase::Recovering) => MessageType::Recovered,
            (Delivery::Retained, _) => {
                *phase = Phase::Live;
                MessageType::Snapshot
            }
            (Delivery::Replay | Delivery::Live, Phase::Recovering | Phase::Live) => {
                *phase = Phase::Live;
                MessageType::Update
            }
            (Delivery::Replay | Delivery::Live, _) => {
                *phase = Phase::Live;
                MessageType::Snapshot
            }
        };

        if guaranteed {
            registry.observe(&message.subject, message.epoch, message.seq);
        }
        Some(message_type)
    }

    /// Drops the phase of an unsubscribed subject.
    pub fn forget(&mut self, subject: &str) {
        self.phases.remove(subject);
    }

    /// Drops every phase; called when the session ends.
    pub fn reset(&mut self) {
        self.phases.clear();
    }
}
