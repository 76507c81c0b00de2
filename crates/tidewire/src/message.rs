//! Messages exchanged with the cluster.

use std::fmt;

/// Delivery guarantee of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QoS {
    /// At-most-once; not cached by the cluster.
    Standard,
    /// At-least-once; cached by the cluster for failover recovery.
    #[default]
    Guaranteed,
}

/// How a received message reached the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// First live message of a subject after a fresh (re)subscription.
    Snapshot,
    /// Subsequent live message.
    Update,
    /// Replayed from the server cache during a failover sync.
    Recovered,
    /// Retrieved on request through a history subscription.
    Historical,
}

impl MessageType {
    /// Returns the canonical name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Snapshot => "SNAPSHOT",
            MessageType::Update => "UPDATE",
            MessageType::Recovered => "RECOVERED",
            MessageType::Historical => "HISTORICAL",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A published or received message.
///
/// Outgoing messages are built with [`Message::new`] and the `with_*` methods.
/// The sequence number, epoch and [`MessageType`] are assigned on receipt and
/// cannot be set by the caller.
///
/// # Examples
///
/// ```
/// use tidewire::{Message, QoS};
///
/// let request = Message::new("/orders/new", "{\"qty\":10}")
///     .with_closure("order-17")
///     .with_reply_subject("/orders/replies/client-3")
///     .with_qos(QoS::Guaranteed);
///
/// assert_eq!(request.closure(), Some("order-17"));
/// assert!(request.message_type().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    subject: String,
    content: String,
    closure: Option<String>,
    reply_subject: Option<String>,
    qos: QoS,
    retained: bool,
    compressed: bool,
    seq: u64,
    epoch: u64,
    message_type: Option<MessageType>,
}

impl Message {
    /// Creates a guaranteed, retained, uncompressed message.
    pub fn new(subject: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            content: content.into(),
            closure: None,
            reply_subject: None,
            qos: QoS::default(),
            retained: true,
            compressed: false,
            seq: 0,
            epoch: 0,
            message_type: None,
        }
    }

    /// Attaches closure data. An empty closure means no acknowledgment is
    /// requested.
    pub fn with_closure(mut self, closure: impl Into<String>) -> Self {
        let closure = closure.into();
        self.closure = (!closure.is_empty()).then_some(closure);
        self
    }

    /// Turns the message into a request answered on `reply_subject`.
    pub fn with_reply_subject(mut self, reply_subject: impl Into<String>) -> Self {
        let reply_subject = reply_subject.into();
        self.reply_subject = (!reply_subject.is_empty()).then_some(reply_subject);
        self
    }

    /// Sets the delivery guarantee.
    pub fn with_qos(mut self, qos: QoS) -> Self {
        self.qos = qos;
        self
    }

    /// Sets whether the cluster should retain the message.
    pub fn with_retained(mut self, retained: bool) -> Self {
        self.retained = retained;
        self
    }

    /// Requests zlib compression. The content is only sent compressed when the
    /// compressed form is smaller.
    pub fn with_compressed(mut self, compressed: bool) -> Self {
        self.compressed = compressed;
        self
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn received(
        subject: String,
        content: String,
        reply_subject: Option<String>,
        qos: QoS,
        retained: bool,
        compressed: bool,
        seq: u64,
        epoch: u64,
        message_type: MessageType,
    ) -> Self {
        Self {
            subject,
            content,
            closure: None,
            reply_subject,
            qos,
            retained,
            compressed,
            seq,
            epoch,
            message_type: Some(message_type),
        }
    }

    /// Returns the subject.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns the content.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns the closure data, if any.
    pub fn closure(&self) -> Option<&str> {
        self.closure.as_deref()
    }

    /// Returns the reply subject, if the message is a request.
    pub fn reply_subject(&self) -> Option<&str> {
        self.reply_subject.as_deref()
    }

    /// Returns the delivery guarantee.
    pub fn qos(&self) -> QoS {
        self.qos
    }

    /// Returns whether the message should be, or was, retained.
    pub fn is_retained(&self) -> bool {
        self.retained
    }

    /// Returns whether the message should be, or was, compressed.
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Returns the server-assigned sequence number (0 for outgoing messages).
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Returns the server-assigned cache epoch (0 for outgoing messages).
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Returns how a received message was delivered; `None` for outgoing ones.
    pub fn message_type(&self) -> Option<MessageType> {
        self.message_type
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Message {{ subject = {}, content = {}, closure = {}, qos = {:?}, retained = {}, \
             compressed = {}, reply_subject = {}, seq = {}, epoch = {}, type = {} }}",
            self.subject,
            self.content,
            self.closure.as_deref().unwrap_or(""),
            self.qos,
            self.retained,
            self.compressed,
            self.reply_subject.as_deref().unwrap_or(""),
            self.seq,
            self.epoch,
            self.message_type.map(|t| t.as_str()).unwrap_or("-"),
        )
    }
}
