//! Connection, subscription and publish status notifications.

use std::fmt;

/// A notification delivered to [`Listener::on_status`](crate::Listener::on_status).
///
/// Every variant carries the detail that identifies what it refers to: the
/// server address, the subject or the closure of the publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// A connection to `address` has been established.
    ServerUp { address: String },
    /// Connecting to `address` failed the configured number of times in a row.
    ServerDown { address: String },
    /// After a failover, the subject resumed without gaps.
    DataSync { subject: String },
    /// After a failover, continuity of the subject could not be proven; it was
    /// resubscribed from its latest retained message.
    DataResync { subject: String },
    /// Subscription to the subject was allowed by the entitlement check.
    SubscribeAllow { subject: String },
    /// Subscription to the subject was denied by the entitlement check.
    SubscribeDeny { subject: String },
    /// The publish identified by `closure` was accepted.
    PublishOk { closure: String },
    /// The publish identified by `closure` could not be delivered.
    PublishFailed { closure: String },
    /// The publish identified by `closure` was rejected by the entitlement check.
    PublishDenied { closure: String },
    /// The publish identified by `closure` exceeded the server's size limit.
    MessageSizeLimitExceeded { closure: String },
    /// More reconnect attempts than allowed happened inside one rate window.
    ReconnectRateExceeded { attempts: usize },
}

impl Status {
    /// Returns the canonical notification name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::ServerUp { .. } => "NOTIFY_SERVER_UP",
            Status::ServerDown { .. } => "NOTIFY_SERVER_DOWN",
            Status::DataSync { .. } => "NOTIFY_DATA_SYNC",
            Status::DataResync { .. } => "NOTIFY_DATA_RESYNC",
            Status::SubscribeAllow { .. } => "NOTIFY_SUBSCRIBE_ALLOW",
            Status::SubscribeDeny { .. } => "NOTIFY_SUBSCRIBE_DENY",
            Status::PublishOk { .. } => "NOTIFY_PUBLISH_OK",
            Status::PublishFailed { .. } => "NOTIFY_PUBLISH_FAILED",
            Status::PublishDenied { .. } => "NOTIFY_PUBLISH_DENIED",
            Status::MessageSizeLimitExceeded { .. } => "NOTIFY_MESSAGE_SIZE_LIMIT_EXCEEDED",
            Status::ReconnectRateExceeded { .. } => "NOTIFY_RECONNECT_RATE_EXCEEDED",
        }
    }

    /// Returns the detail carried by the notification as text.
    pub fn info(&self) -> String {
        match self {
            Status::ServerUp { address } | Status::ServerDown { address } => address.clone(),
            Status::DataSync { subject }
            | Status::DataResync { subject }
            | Status::SubscribeAllow { subject }
            | Status::SubscribeDeny { subject } => subject.clone(),
            Status::PublishOk { closure }
            | Status::PublishFailed { closure }
            | Status::PublishDenied { closure }
            | Status::MessageSizeLimitExceeded { closure } => closure.clone(),
            Status::ReconnectRateExceeded { attempts } => attempts.to_string(),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.as_str(), self.info())
    }
}
