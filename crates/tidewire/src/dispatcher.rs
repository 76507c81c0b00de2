//! Serial delivery of messages and statuses to the application.

use crate::message::Message;
use crate::status::Status;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Receives everything the client delivers to the application.
///
/// Callbacks run one at a time, in the order the client produced them, on a
/// task separate from the connection. A slow callback delays later deliveries
/// but never the connection itself. A panicking callback is isolated and the
/// next delivery proceeds.
pub trait Listener: Send + 'static {
    fn on_message(&mut self, message: Message);
    fn on_status(&mut self, status: Status);
}

#[derive(Debug)]
enum Delivery {
    Message(Message),
    Status(Status),
}

/// Queues deliveries for the listener task.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    tx: mpsc::UnboundedSender<Delivery>,
}

impl EventDispatcher {
    /// Spawns the listener task on the current runtime.
    ///
    /// Deliveries are held while `paused` is `true`. The task ends once every
    /// dispatcher handle is dropped and the queue is drained.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn<L: Listener>(listener: L, paused: watch::Receiver<bool>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(deliver(listener, rx, paused));
        (Self { tx }, handle)
    }

    /// Queues a message. Returns `false` if the listener task is gone.
    pub fn message(&self, message: Message) -> bool {
        self.tx.send(Delivery::Message(message)).is_ok()
    }

    /// Queues a status. Returns `false` if the listener task is gone.
    pub fn status(&self, status: Status) -> bool {
        self.tx.send(Delivery::Status(status)).is_ok()
    }
}

async fn deliver<L: Listener>(
    mut listener: L,
    mut rx: mpsc::UnboundedReceiver<Delivery>,
    mut paused: watch::Receiver<bool>,
) {
    while let Some(delivery) = rx.recv().await {
        // A dropped pause sender means the client is gone; drain regardless.
        let _ = paused.wait_for(|paused| !*paused).await;

        let outcome = catch_unwind(AssertUnwindSafe(|| match delivery {
            Delivery::Message(message) => listener.on_message(message),
            Delivery::Status(status) => listener.on_status(status),
        }));
        if outcome.is_err() {
            tracing::error!("listener panicked; continuing with next delivery");
        }
    }
}
