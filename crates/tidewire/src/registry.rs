//! The set of subscribed subjects and their delivery watermarks.

use std::collections::BTreeMap;

/// Position of the last guaranteed message received on a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermark {
    pub epoch: u64,
    pub seq: u64,
}

impl Watermark {
    /// Whether a message at `(epoch, seq)` was already seen: same epoch and a
    /// sequence number not beyond this watermark.
    pub fn covers(&self, epoch: u64, seq: u64) -> bool {
        epoch == self.epoch && seq <= self.seq
    }
}

/// One subscribed subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectSubscription {
    subject: String,
    watermark: Option<Watermark>,
    history: u32,
}

impl SubjectSubscription {
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The last guaranteed message seen, if any.
    pub fn watermark(&self) -> Option<Watermark> {
        self.watermark
    }

    /// Number of historical messages requested at subscription time.
    pub fn history(&self) -> u32 {
        self.history
    }
}

/// Subjects the client is subscribed to.
///
/// Entries survive disconnects: the registry is what gets replayed to the
/// next server.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    subjects: BTreeMap<String, SubjectSubscription>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `subject`, requesting `history` cached messages on first
    /// delivery. Returns `false` if it was already subscribed; the existing
    /// entry is left untouched.
    pub fn insert(&mut self, subject: impl Into<String>, history: u32) -> bool {
        let subject = subject.into();
        if self.subjects.contains_key(&subject) {
            return false;
        }
        self.subjects.insert(
            subject.clone(),
            SubjectSubscription {
                subject,
                watermark: None,
                history,
            },
        );
        true
    }

    /// Removes `subject`. Returns whether it was subscribed.
    pub fn remove(&mut self, subject: &str) -> bool {
        self.subjects.remove(subject).is_some()
    }

    pub fn contains(&self, subject: &str) -> bool {
        self.subjects.contains_key(subject)
    }

    pub fn get(&self, subject: &str) -> Option<&SubjectSubscription> {
        self.subjects.get(subject)
    }

    /// Advances the watermark of `subject` to `(epoch, seq)`.
    ///
    /// Within one epoch the watermark only moves forward; a different epoch
    /// replaces it.
    pub fn observe(&mut self, subject: &str, epoch: u64, seq: u64) {
        if let Some(entry) = self.subjects.get_mut(subject) {
            match entry.watermark {
                Some(watermark) if watermark.covers(epoch, seq) => {}
                _ => entry.watermark = Some(Watermark { epoch, seq }),
            }
        }
    }

    /// Forgets the watermark of `subject`.
    pub fn reset_watermark(&mut self, subject: &str) {
        if let Some(entry) = self.subjects.get_mut(subject) {
            entry.watermark = None;
        }
    }

    /// Subscribed subject names, in lexical order.
    pub fn subjects(&self) -> Vec<String> {
        self.subjects.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SubjectSubscription> {
        self.subjects.values()
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}
